//! "Today" view aggregating places and stays across many trips.
//!
//! Holds no store of its own: every read re-derives the entries from the
//! per-trip projections, so it can never drift from them.

use chrono::{Local, NaiveDate};

use super::{
    ProjectionStore, SubscriptionManager, SyncError, SyncedCollection, ViewSubscription, WatchId,
};
use crate::models::{Accommodation, Place};

/// Entries falling on one date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayAgenda {
    pub date: Option<NaiveDate>,
    /// Places visited that day, by visit time then name; untimed last.
    pub places: Vec<Place>,
    /// Stays covering that day, by check-in then name.
    pub accommodations: Vec<Accommodation>,
}

pub struct TodayView {
    places: SyncedCollection<Place>,
    accommodations: SyncedCollection<Accommodation>,
    trip_ids: Vec<String>,
    view: ViewSubscription,
    place_watch: WatchId,
    stay_watch: WatchId,
}

impl TodayView {
    /// Mount over `trip_ids`, one channel per trip and kind.
    pub fn mount(
        manager: &SubscriptionManager,
        places: SyncedCollection<Place>,
        accommodations: SyncedCollection<Accommodation>,
        trip_ids: Vec<String>,
    ) -> Self {
        let mut view = manager.mount();
        let place_watch = view.watch(places.store().clone(), trip_ids.clone());
        let stay_watch = view.watch(accommodations.store().clone(), trip_ids.clone());
        Self {
            places,
            accommodations,
            trip_ids,
            view,
            place_watch,
            stay_watch,
        }
    }

    pub fn view(&self) -> &ViewSubscription {
        &self.view
    }

    pub fn trip_ids(&self) -> &[String] {
        &self.trip_ids
    }

    /// The user's trip set changed.
    pub fn retarget(&mut self, trip_ids: Vec<String>) {
        self.view.retarget(self.place_watch, trip_ids.clone());
        self.view.retarget(self.stay_watch, trip_ids.clone());
        self.trip_ids = trip_ids;
    }

    /// Full fetch of every trip in view.
    pub async fn load(&self) -> Result<(), SyncError> {
        let liveness = self.view.liveness();
        for trip_id in &self.trip_ids {
            self.places.load(trip_id, liveness).await?;
            self.accommodations.load(trip_id, liveness).await?;
        }
        self.view.mark_fresh();
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.trip_ids.iter().any(|id| {
            self.places.store().is_loading(id) || self.accommodations.store().is_loading(id)
        })
    }

    pub fn is_stale(&self) -> bool {
        self.view.is_stale()
    }

    pub fn today(&self) -> DayAgenda {
        self.agenda(Local::now().date_naive())
    }

    pub fn agenda(&self, date: NaiveDate) -> DayAgenda {
        agenda_for(
            date,
            &self.trip_ids,
            self.places.store().as_ref(),
            self.accommodations.store().as_ref(),
        )
    }
}

fn agenda_for(
    date: NaiveDate,
    trip_ids: &[String],
    places: &ProjectionStore<Place>,
    stays: &ProjectionStore<Accommodation>,
) -> DayAgenda {
    let mut day_places: Vec<Place> = trip_ids
        .iter()
        .flat_map(|id| places.items(id))
        .filter(|p| p.visit_date == Some(date))
        .collect();
    day_places.sort_by(|a, b| {
        let time = |p: &Place| (p.visit_time.is_none(), p.visit_time.clone());
        time(a).cmp(&time(b)).then_with(|| a.name.cmp(&b.name))
    });

    let mut day_stays: Vec<Accommodation> = trip_ids
        .iter()
        .flat_map(|id| stays.items(id))
        .filter(|s| s.covers(date))
        .collect();
    day_stays.sort_by(|a, b| a.check_in.cmp(&b.check_in).then_with(|| a.name.cmp(&b.name)));

    DayAgenda {
        date: Some(date),
        places: day_places,
        accommodations: day_stays,
    }
}
