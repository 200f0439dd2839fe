use std::sync::Arc;

use chrono::{DateTime, Utc};
use nexus_core::model::{CalendarEvent, EventDraft, EventId, Occurrence, User};
use nexus_core::recurrence::{DateRange, expand_occurrences};
use storage::repository::{CalendarRepository, StorageError};
use tracing::info;

use crate::error::CalendarServiceError;
use crate::realtime::{Broadcaster, RealtimeEvent, Recipients};

/// Event authoring and windowed occurrence queries.
#[derive(Clone)]
pub struct CalendarService {
    events: Arc<dyn CalendarRepository>,
    broadcaster: Broadcaster,
}

impl CalendarService {
    #[must_use]
    pub fn new(events: Arc<dyn CalendarRepository>, broadcaster: Broadcaster) -> Self {
        Self {
            events,
            broadcaster,
        }
    }

    /// # Errors
    ///
    /// Returns `CalendarServiceError::Forbidden` for students and
    /// `CalendarServiceError::Calendar` for invalid drafts.
    pub async fn create_event(
        &self,
        actor: &User,
        draft: EventDraft,
    ) -> Result<CalendarEvent, CalendarServiceError> {
        if !actor.role.can_author() {
            return Err(CalendarServiceError::Forbidden);
        }
        let draft = draft.validate()?;
        let event = self.events.insert_event(&draft, actor.id).await?;
        info!(event = %event.id, recurrence = event.recurrence.as_str(), "event created");
        self.announce(event.id);
        Ok(event)
    }

    /// # Errors
    ///
    /// Returns `CalendarServiceError::Forbidden` unless `actor` created the
    /// event or is an admin.
    pub async fn update_event(
        &self,
        actor: &User,
        id: EventId,
        draft: EventDraft,
    ) -> Result<CalendarEvent, CalendarServiceError> {
        self.managed_event(actor, id).await?;
        let draft = draft.validate()?;
        let event = self.events.update_event(id, &draft).await?;
        self.announce(event.id);
        Ok(event)
    }

    /// # Errors
    ///
    /// Returns `CalendarServiceError::Forbidden` unless `actor` created the
    /// event or is an admin.
    pub async fn delete_event(
        &self,
        actor: &User,
        id: EventId,
    ) -> Result<(), CalendarServiceError> {
        self.managed_event(actor, id).await?;
        match self.events.delete_event(id).await {
            Ok(()) => {}
            Err(StorageError::NotFound) => return Err(CalendarServiceError::NotFound),
            Err(err) => return Err(err.into()),
        }
        info!(event = %id, "event deleted");
        self.announce(id);
        Ok(())
    }

    /// Expanded occurrences in `[start, end]` whose audience includes the viewer.
    ///
    /// # Errors
    ///
    /// Returns `CalendarServiceError::Calendar` if `end` precedes `start`.
    pub async fn list_occurrences(
        &self,
        viewer: &User,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Occurrence>, CalendarServiceError> {
        let range = DateRange::new(start, end)?;
        let events: Vec<CalendarEvent> = self
            .events
            .list_candidate_events(range)
            .await?
            .into_iter()
            .filter(|event| event.audience.includes(viewer.role))
            .collect();
        Ok(expand_occurrences(&events, range))
    }

    async fn managed_event(
        &self,
        actor: &User,
        id: EventId,
    ) -> Result<CalendarEvent, CalendarServiceError> {
        let event = self
            .events
            .get_event(id)
            .await?
            .ok_or(CalendarServiceError::NotFound)?;
        if !(actor.role.is_admin() || event.created_by == actor.id) {
            return Err(CalendarServiceError::Forbidden);
        }
        Ok(event)
    }

    fn announce(&self, event_id: EventId) {
        self.broadcaster
            .publish(Recipients::Everyone, RealtimeEvent::CalendarChanged { event_id });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use nexus_core::model::{Audience, Recurrence, Role, UserId};
    use nexus_core::time::fixed_now;
    use storage::InMemoryRepository;

    fn user(id: u64, role: Role) -> User {
        User {
            id: UserId::new(id),
            email: format!("u{id}@corp.example"),
            name: format!("User {id}"),
            role,
            xp: 0,
            created_at: fixed_now(),
        }
    }

    fn service() -> CalendarService {
        CalendarService::new(Arc::new(InMemoryRepository::new()), Broadcaster::new(8))
    }

    fn standup(audience: Audience) -> EventDraft {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        EventDraft {
            title: "Standup".into(),
            description: None,
            location: None,
            start,
            end: start + Duration::minutes(15),
            all_day: false,
            audience,
            recurrence: Recurrence::Weekly,
            recurrence_end_date: None,
        }
    }

    #[tokio::test]
    async fn weekly_event_yields_one_occurrence_per_week() {
        let broadcaster = Broadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let service = CalendarService::new(Arc::new(InMemoryRepository::new()), broadcaster);
        let instructor = user(1, Role::Instructor);

        let event = service
            .create_event(&instructor, standup(Audience::All))
            .await
            .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap().event,
            RealtimeEvent::CalendarChanged { event_id } if event_id == event.id
        ));

        let from = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let occurrences = service
            .list_occurrences(&user(2, Role::Student), from, from + Duration::days(7))
            .await
            .unwrap();
        assert_eq!(occurrences.len(), 1);
        assert_eq!(occurrences[0].id, format!("{}-2024-03-04", event.id));
        assert_eq!(occurrences[0].end - occurrences[0].start, Duration::minutes(15));
    }

    #[tokio::test]
    async fn audience_filters_occurrences() {
        let service = service();
        service
            .create_event(&user(1, Role::Administrator), standup(Audience::Instructors))
            .await
            .unwrap();

        let from = Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap();
        let to = from + Duration::days(7);
        assert!(
            service
                .list_occurrences(&user(2, Role::Student), from, to)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            service
                .list_occurrences(&user(3, Role::Instructor), from, to)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn only_creator_or_admin_may_delete() {
        let service = service();
        let event = service
            .create_event(&user(1, Role::Instructor), standup(Audience::All))
            .await
            .unwrap();

        assert!(matches!(
            service.delete_event(&user(4, Role::Instructor), event.id).await,
            Err(CalendarServiceError::Forbidden)
        ));
        service
            .delete_event(&user(9, Role::Administrator), event.id)
            .await
            .unwrap();
        assert!(matches!(
            service.delete_event(&user(1, Role::Instructor), event.id).await,
            Err(CalendarServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn inverted_window_is_rejected() {
        let service = service();
        let now = fixed_now();
        assert!(matches!(
            service
                .list_occurrences(&user(1, Role::Student), now, now - Duration::days(1))
                .await,
            Err(CalendarServiceError::Calendar(_))
        ));
    }
}
