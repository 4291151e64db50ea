use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

/// Background task that completes confirmed bookings once their session date
/// has passed. Date granularity only, so an hourly sweep is plenty.
pub async fn run_sweeper(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(Duration::from_secs(3600));
    loop {
        interval.tick().await;
        let today = chrono::Local::now().date_naive();
        let finished = engine.collect_finished_sessions(today);
        for id in finished {
            match engine.mark_completed(id).await {
                Ok(_) => info!("completed session {id}"),
                Err(e) => {
                    // May have been cancelled in the meantime — that's fine
                    tracing::debug!("sweeper skip {id}: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use crate::notify::NotifyHub;
    use chrono::Datelike;
    use ulid::Ulid;

    async fn seeded_engine() -> (Engine, Ulid, Ulid, Ulid) {
        let engine = Engine::new(Arc::new(NotifyHub::new()));
        let tutor = Ulid::new();
        let parent = Ulid::new();
        let child = Ulid::new();
        engine
            .create_tutor(tutor, "Sarah".into(), 60.0, vec!["Math".into()])
            .await
            .unwrap();
        engine.create_parent(parent, "Jennifer".into()).await.unwrap();
        engine
            .create_child(child, parent, "Emma".into(), None)
            .await
            .unwrap();
        (engine, tutor, parent, child)
    }

    #[tokio::test]
    async fn sweeper_collects_past_confirmed_sessions() {
        let (engine, tutor, parent, child) = seeded_engine().await;

        // Book today's slot so the date check passes at creation
        let today = chrono::Local::now().date_naive();
        engine
            .set_availability(tutor, today.weekday(), vec!["09:00".parse().unwrap()])
            .await
            .unwrap();
        let booking = engine
            .create_booking(BookingRequest {
                tutor_id: tutor,
                parent_id: parent,
                child_id: child,
                subject: "Math".into(),
                date: today,
                time: "09:00".parse().unwrap(),
                duration_minutes: 60,
                notes: None,
            })
            .await
            .unwrap();
        engine
            .transition(booking.id, Actor::Tutor, BookingAction::Approve)
            .await
            .unwrap();

        // Not finished on the session day itself
        assert!(engine.collect_finished_sessions(today).is_empty());

        // Finished once the date is strictly past
        let tomorrow = today.succ_opt().unwrap();
        let finished = engine.collect_finished_sessions(tomorrow);
        assert_eq!(finished, vec![booking.id]);

        let completed = engine.mark_completed(booking.id).await.unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);

        // Nothing left to collect
        assert!(engine.collect_finished_sessions(tomorrow).is_empty());
    }

    #[tokio::test]
    async fn sweeper_ignores_pending_and_cancelled() {
        let (engine, tutor, parent, child) = seeded_engine().await;

        let today = chrono::Local::now().date_naive();
        engine
            .set_availability(
                tutor,
                today.weekday(),
                vec!["09:00".parse().unwrap(), "10:00".parse().unwrap()],
            )
            .await
            .unwrap();

        let request = BookingRequest {
            tutor_id: tutor,
            parent_id: parent,
            child_id: child,
            subject: "Math".into(),
            date: today,
            time: "09:00".parse().unwrap(),
            duration_minutes: 60,
            notes: None,
        };
        let pending = engine.create_booking(request.clone()).await.unwrap();
        let cancelled = engine
            .create_booking(BookingRequest {
                time: "10:00".parse().unwrap(),
                ..request
            })
            .await
            .unwrap();
        engine
            .transition(cancelled.id, Actor::Parent, BookingAction::Cancel)
            .await
            .unwrap();

        let tomorrow = today.succ_opt().unwrap();
        assert!(engine.collect_finished_sessions(tomorrow).is_empty());

        // Still pending and cancelled, untouched
        assert_eq!(
            engine.booking(pending.id).await.unwrap().status,
            BookingStatus::Pending
        );
    }
}
