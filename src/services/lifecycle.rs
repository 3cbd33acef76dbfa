//! Booking lifecycle state machine.
//!
//! All status changes on a booking are planned here, away from the
//! transport layer. A plan carries the status the booking is expected to
//! still have when the write lands; the route applies it as a conditional
//! update so two racing callers cannot both win.

use mongodb::bson::oid::ObjectId;

use crate::models::{
    Booking, BookingStatus, Notification, NotificationType, Payment, PaymentStatus, Rating, Role,
};

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleError {
    Validation(String),
    Authorization(String),
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::Validation(msg) => write!(f, "{}", msg),
            LifecycleError::Authorization(msg) => write!(f, "{}", msg),
            LifecycleError::InvalidTransition { from, to } => {
                write!(f, "Cannot move booking from {} to {}", from.as_str(), to.as_str())
            }
        }
    }
}

/// The authenticated caller, as seen by the state machine.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: ObjectId,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Freelancer,
}

/// Which party of the booking the actor is, if any. Role and ownership
/// must both match: a freelancer who happens to be booked as a client
/// elsewhere is still only the client on that booking.
pub fn side_of(booking: &Booking, actor: &Actor) -> Option<Side> {
    match actor.role {
        Role::Client if booking.client_id == actor.id => Some(Side::Client),
        Role::Freelancer if booking.freelancer_id == actor.id => Some(Side::Freelancer),
        _ => None,
    }
}

/// Timestamp stamped by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stamp {
    AcceptedAt,
    StartedAt,
    CompletedAt,
}

impl Stamp {
    pub fn field(&self) -> &'static str {
        match self {
            Stamp::AcceptedAt => "accepted_at",
            Stamp::StartedAt => "started_at",
            Stamp::CompletedAt => "completed_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationSpec {
    pub recipient: ObjectId,
    pub kind: NotificationType,
}

/// Everything a route needs to apply one transition atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPlan {
    /// Status the booking must still hold when the update lands. A
    /// conditional update matching zero documents means a concurrent
    /// writer got there first.
    pub expected_status: BookingStatus,
    pub next_status: BookingStatus,
    pub stamp: Option<Stamp>,
    pub append_before_photos: Vec<String>,
    /// Confirm-completion also flips the booking's payment state and
    /// releases the linked payment.
    pub release_payment: bool,
    pub notify: Option<NotificationSpec>,
}

/// Accept/reject are valid while the booking is still awaiting the
/// freelancer; paying up front moves the status to `paid` without
/// consuming the freelancer's decision.
fn awaiting_freelancer(status: BookingStatus) -> bool {
    matches!(status, BookingStatus::Pending | BookingStatus::Paid)
}

pub fn plan_transition(
    booking: &Booking,
    actor: &Actor,
    target: BookingStatus,
    before_photos: &[String],
) -> Result<TransitionPlan, LifecycleError> {
    let side = side_of(booking, actor)
        .ok_or_else(|| LifecycleError::Authorization("Unauthorized".to_string()))?;

    let from = booking.status;
    let invalid = || LifecycleError::InvalidTransition { from, to: target };

    match (target, side) {
        (BookingStatus::Accepted, Side::Freelancer) => {
            if !awaiting_freelancer(from) {
                return Err(invalid());
            }
            Ok(TransitionPlan {
                expected_status: from,
                next_status: BookingStatus::Accepted,
                stamp: Some(Stamp::AcceptedAt),
                append_before_photos: Vec::new(),
                release_payment: false,
                notify: Some(NotificationSpec {
                    recipient: booking.client_id,
                    kind: NotificationType::BookingAccepted,
                }),
            })
        }
        (BookingStatus::Accepted, Side::Client) => Err(LifecycleError::Authorization(
            "Only freelancers can accept bookings".to_string(),
        )),

        (BookingStatus::Rejected, Side::Freelancer) => {
            if !awaiting_freelancer(from) {
                return Err(invalid());
            }
            Ok(TransitionPlan {
                expected_status: from,
                next_status: BookingStatus::Rejected,
                stamp: None,
                append_before_photos: Vec::new(),
                release_payment: false,
                notify: Some(NotificationSpec {
                    recipient: booking.client_id,
                    kind: NotificationType::BookingRejected,
                }),
            })
        }
        (BookingStatus::Rejected, Side::Client) => Err(LifecycleError::Authorization(
            "Only freelancers can reject bookings".to_string(),
        )),

        (BookingStatus::InProgress, Side::Freelancer) => {
            if from != BookingStatus::Accepted {
                return Err(invalid());
            }
            if before_photos.is_empty() {
                return Err(LifecycleError::Validation(
                    "Before photos are required to start the job".to_string(),
                ));
            }
            Ok(TransitionPlan {
                expected_status: BookingStatus::Accepted,
                next_status: BookingStatus::InProgress,
                stamp: Some(Stamp::StartedAt),
                append_before_photos: before_photos.to_vec(),
                release_payment: false,
                notify: Some(NotificationSpec {
                    recipient: booking.client_id,
                    kind: NotificationType::JobStarted,
                }),
            })
        }
        (BookingStatus::InProgress, Side::Client) => Err(LifecycleError::Authorization(
            "Only freelancers can start jobs".to_string(),
        )),

        // Freelancer marks the work done; client still has to confirm.
        (BookingStatus::Completed, Side::Freelancer) => {
            if from != BookingStatus::InProgress {
                return Err(invalid());
            }
            Ok(TransitionPlan {
                expected_status: BookingStatus::InProgress,
                next_status: BookingStatus::Completed,
                stamp: Some(Stamp::CompletedAt),
                append_before_photos: Vec::new(),
                release_payment: false,
                notify: Some(NotificationSpec {
                    recipient: booking.client_id,
                    kind: NotificationType::JobCompleted,
                }),
            })
        }

        // Client confirms completion, releasing the escrowed payment.
        (BookingStatus::Completed, Side::Client) => {
            if from != BookingStatus::Completed {
                return Err(invalid());
            }
            Ok(TransitionPlan {
                expected_status: BookingStatus::Completed,
                next_status: BookingStatus::Completed,
                stamp: None,
                append_before_photos: Vec::new(),
                release_payment: true,
                notify: Some(NotificationSpec {
                    recipient: booking.freelancer_id,
                    kind: NotificationType::PaymentReleased,
                }),
            })
        }

        _ => Err(invalid()),
    }
}

/// Guard for confirm-completion: the booking must actually have been paid,
/// and the payment must still be releasable.
pub fn ensure_releasable(payment: Option<&Payment>) -> Result<(), LifecycleError> {
    match payment {
        None => Err(LifecycleError::Validation(
            "No payment exists for this booking".to_string(),
        )),
        Some(p) => match p.status {
            PaymentStatus::Pending | PaymentStatus::Completed => Ok(()),
            PaymentStatus::Released => Err(LifecycleError::Validation(
                "Payment has already been released".to_string(),
            )),
            PaymentStatus::Failed | PaymentStatus::Refunded => Err(LifecycleError::Validation(
                format!("Payment is {} and cannot be released", p.status.as_str()),
            )),
        },
    }
}

pub fn validate_rating(rating: i32) -> Result<(), LifecycleError> {
    if !(1..=5).contains(&rating) {
        return Err(LifecycleError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

/// Which review slot the actor writes to. Strangers get neither.
pub fn review_side(booking: &Booking, actor: &Actor) -> Result<Side, LifecycleError> {
    side_of(booking, actor)
        .ok_or_else(|| LifecycleError::Authorization("Unauthorized".to_string()))
}

/// Mean of all client review ratings, rounded to one decimal.
pub fn recompute_rating(ratings: &[i32]) -> Rating {
    if ratings.is_empty() {
        return Rating {
            average: 0.0,
            count: 0,
        };
    }
    let sum: i32 = ratings.iter().sum();
    let average = sum as f64 / ratings.len() as f64;
    Rating {
        average: (average * 10.0).round() / 10.0,
        count: ratings.len() as i64,
    }
}

/// Notification content for booking lifecycle events, addressed to the
/// plan's recipient.
pub fn build_notification(spec: &NotificationSpec, booking: &Booking) -> Notification {
    let (title, message) = match spec.kind {
        NotificationType::BookingRequest => (
            "New Booking Request",
            format!("You have a new booking request for {}", booking.service_name),
        ),
        NotificationType::BookingAccepted => (
            "Booking Accepted",
            format!("Your booking for {} has been accepted", booking.service_name),
        ),
        NotificationType::BookingRejected => (
            "Booking Rejected",
            format!("Your booking for {} has been rejected", booking.service_name),
        ),
        NotificationType::JobStarted => (
            "Job Started",
            format!("Work has started on your {} booking", booking.service_name),
        ),
        NotificationType::JobCompleted => (
            "Job Completed",
            format!(
                "Your {} booking has been completed. Please review and confirm.",
                booking.service_name
            ),
        ),
        NotificationType::PaymentReceived => (
            "Payment Received",
            format!(
                "Payment of ${} has been received for your booking. You can now start the job.",
                booking.total_amount
            ),
        ),
        NotificationType::PaymentReleased => (
            "Payment Released",
            format!(
                "Payment of ${} has been released to you for the completed job.",
                booking.freelancer_amount
            ),
        ),
        NotificationType::ReviewReceived => (
            "New Review Received",
            "You received a new review".to_string(),
        ),
    };

    let mut n = Notification::new(spec.recipient, spec.kind, title, message);
    if let Some(id) = booking.id {
        n = n.about_booking(id);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BookingPaymentStatus, LocationKind, PaymentMethod, ServiceLocation,
    };
    use mongodb::bson::DateTime;

    fn booking(status: BookingStatus) -> Booking {
        Booking {
            id: Some(ObjectId::new()),
            client_id: ObjectId::new(),
            freelancer_id: ObjectId::new(),
            service_id: ObjectId::new(),
            package_id: ObjectId::new(),
            service_category: "House Cleaning".to_string(),
            service_name: "Deep Clean".to_string(),
            package_name: "Standard".to_string(),
            scheduled_date: DateTime::now(),
            estimated_hours: 3.0,
            total_amount: 100.0,
            platform_fee: 5.0,
            freelancer_amount: 95.0,
            service_location: ServiceLocation {
                kind: LocationKind::ClientLocation,
                address: "12 Acacia Ave".to_string(),
                coordinates: None,
            },
            before_photos: Vec::new(),
            after_photos: None,
            special_instructions: None,
            status,
            payment_status: BookingPaymentStatus::Pending,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
            accepted_at: None,
            started_at: None,
            completed_at: None,
            client_review: None,
            freelancer_review: None,
        }
    }

    fn freelancer_of(b: &Booking) -> Actor {
        Actor {
            id: b.freelancer_id,
            role: Role::Freelancer,
        }
    }

    fn client_of(b: &Booking) -> Actor {
        Actor {
            id: b.client_id,
            role: Role::Client,
        }
    }

    fn payment(status: PaymentStatus) -> Payment {
        Payment {
            id: Some(ObjectId::new()),
            booking_id: ObjectId::new(),
            client_id: ObjectId::new(),
            freelancer_id: ObjectId::new(),
            amount: 100.0,
            platform_fee: 5.0,
            freelancer_amount: 95.0,
            payment_method: PaymentMethod::Mpesa,
            status,
            transaction_id: "TXN_1_abc".to_string(),
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
            released_at: None,
        }
    }

    #[test]
    fn freelancer_accepts_pending_booking() {
        let b = booking(BookingStatus::Pending);
        let plan = plan_transition(&b, &freelancer_of(&b), BookingStatus::Accepted, &[])
            .expect("accept should be allowed");

        assert_eq!(plan.expected_status, BookingStatus::Pending);
        assert_eq!(plan.next_status, BookingStatus::Accepted);
        assert_eq!(plan.stamp, Some(Stamp::AcceptedAt));
        let notify = plan.notify.expect("client should be notified");
        assert_eq!(notify.recipient, b.client_id);
        assert_eq!(notify.kind, NotificationType::BookingAccepted);
    }

    #[test]
    fn freelancer_accepts_paid_booking() {
        let b = booking(BookingStatus::Paid);
        let plan = plan_transition(&b, &freelancer_of(&b), BookingStatus::Accepted, &[])
            .expect("paid bookings still await the freelancer");
        assert_eq!(plan.expected_status, BookingStatus::Paid);
    }

    #[test]
    fn repeated_accept_is_rejected() {
        let b = booking(BookingStatus::Accepted);
        let err = plan_transition(&b, &freelancer_of(&b), BookingStatus::Accepted, &[])
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn stranger_cannot_transition() {
        let b = booking(BookingStatus::Pending);
        let stranger = Actor {
            id: ObjectId::new(),
            role: Role::Freelancer,
        };
        let err = plan_transition(&b, &stranger, BookingStatus::Accepted, &[]).unwrap_err();
        assert!(matches!(err, LifecycleError::Authorization(_)));
    }

    #[test]
    fn client_cannot_accept_own_booking() {
        let b = booking(BookingStatus::Pending);
        let err = plan_transition(&b, &client_of(&b), BookingStatus::Accepted, &[]).unwrap_err();
        assert!(matches!(err, LifecycleError::Authorization(_)));
    }

    #[test]
    fn start_requires_before_photos() {
        let b = booking(BookingStatus::Accepted);
        let err =
            plan_transition(&b, &freelancer_of(&b), BookingStatus::InProgress, &[]).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));

        let photos = vec!["before.jpg".to_string()];
        let plan = plan_transition(&b, &freelancer_of(&b), BookingStatus::InProgress, &photos)
            .expect("start with photos");
        assert_eq!(plan.append_before_photos, photos);
        assert_eq!(plan.stamp, Some(Stamp::StartedAt));
        assert_eq!(plan.notify.unwrap().kind, NotificationType::JobStarted);
    }

    #[test]
    fn cannot_start_before_acceptance() {
        let b = booking(BookingStatus::Pending);
        let photos = vec!["before.jpg".to_string()];
        let err = plan_transition(&b, &freelancer_of(&b), BookingStatus::InProgress, &photos)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn freelancer_completes_started_job() {
        let b = booking(BookingStatus::InProgress);
        let plan = plan_transition(&b, &freelancer_of(&b), BookingStatus::Completed, &[])
            .expect("complete from in_progress");
        assert_eq!(plan.stamp, Some(Stamp::CompletedAt));
        assert!(!plan.release_payment);
        assert_eq!(plan.notify.unwrap().kind, NotificationType::JobCompleted);
    }

    #[test]
    fn client_confirmation_releases_payment() {
        let b = booking(BookingStatus::Completed);
        let plan = plan_transition(&b, &client_of(&b), BookingStatus::Completed, &[])
            .expect("client confirms completion");
        assert!(plan.release_payment);
        assert_eq!(plan.next_status, BookingStatus::Completed);
        let notify = plan.notify.unwrap();
        assert_eq!(notify.recipient, b.freelancer_id);
        assert_eq!(notify.kind, NotificationType::PaymentReleased);
    }

    #[test]
    fn client_cannot_confirm_unfinished_job() {
        let b = booking(BookingStatus::InProgress);
        let err = plan_transition(&b, &client_of(&b), BookingStatus::Completed, &[]).unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn off_table_targets_are_invalid() {
        let b = booking(BookingStatus::Pending);
        for target in [
            BookingStatus::Pending,
            BookingStatus::Cancelled,
            BookingStatus::Paid,
        ] {
            let err = plan_transition(&b, &freelancer_of(&b), target, &[]).unwrap_err();
            assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn release_guard_checks_payment_state() {
        assert!(ensure_releasable(Some(&payment(PaymentStatus::Pending))).is_ok());
        assert!(ensure_releasable(Some(&payment(PaymentStatus::Completed))).is_ok());
        assert!(ensure_releasable(None).is_err());
        assert!(ensure_releasable(Some(&payment(PaymentStatus::Released))).is_err());
        assert!(ensure_releasable(Some(&payment(PaymentStatus::Refunded))).is_err());
    }

    #[test]
    fn rating_bounds_are_enforced() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        for r in 1..=5 {
            assert!(validate_rating(r).is_ok());
        }
    }

    #[test]
    fn review_side_matches_booking_party() {
        let b = booking(BookingStatus::Completed);
        assert_eq!(review_side(&b, &client_of(&b)).unwrap(), Side::Client);
        assert_eq!(
            review_side(&b, &freelancer_of(&b)).unwrap(),
            Side::Freelancer
        );

        let stranger = Actor {
            id: ObjectId::new(),
            role: Role::Client,
        };
        assert!(review_side(&b, &stranger).is_err());
    }

    #[test]
    fn payment_and_review_notifications_come_from_the_table() {
        let b = booking(BookingStatus::Paid);

        let received = build_notification(
            &NotificationSpec {
                recipient: b.freelancer_id,
                kind: NotificationType::PaymentReceived,
            },
            &b,
        );
        assert_eq!(received.user_id, b.freelancer_id);
        assert_eq!(received.booking_id, b.id);
        assert!(received.message.contains("100"));

        let review = build_notification(
            &NotificationSpec {
                recipient: b.client_id,
                kind: NotificationType::ReviewReceived,
            },
            &b,
        )
        .with_rating(4);
        assert_eq!(review.user_id, b.client_id);
        assert_eq!(review.rating, Some(4));
        assert_eq!(review.booking_id, b.id);
    }

    #[test]
    fn rating_average_is_mean_rounded_to_one_decimal() {
        assert_eq!(
            recompute_rating(&[5, 4]),
            Rating {
                average: 4.5,
                count: 2
            }
        );
        assert_eq!(
            recompute_rating(&[5, 4, 4]),
            Rating {
                average: 4.3,
                count: 3
            }
        );
        assert_eq!(
            recompute_rating(&[]),
            Rating {
                average: 0.0,
                count: 0
            }
        );
    }
}
