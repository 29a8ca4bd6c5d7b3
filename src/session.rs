//! Session state and its transitions.
//!
//! [`Session::apply`] is the only place session state changes. It is a pure
//! function of the current state and an [`Action`]; anything that must
//! happen outside (network, geolocation) is returned as an [`Effect`] for
//! the coordinator to run.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::FailureReason;
use crate::filters::{FilterState, HoursBack, MagnitudeThreshold};
use crate::models::{LatLon, RenderableEvent};

/// Zoom applied when recentering on the user's location.
pub const LOCATE_ZOOM: u8 = 5;

/// Map camera state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ViewState {
    pub center: LatLon,
    pub zoom: u8,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            center: LatLon { lat: 20.0, lon: 0.0 },
            zoom: 2,
        }
    }
}

/// Result of the most recent committed fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchOutcome {
    #[default]
    Idle,
    Loading,
    Success(Arc<Vec<RenderableEvent>>),
    Failure(FailureReason),
}

impl FetchOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
        }
    }
}

/// Progress of the one-per-session position request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum LocationState {
    #[default]
    NotRequested,
    Pending,
    Known(LatLon),
    Unavailable,
}

impl LocationState {
    #[must_use]
    pub const fn position(self) -> Option<LatLon> {
        match self {
            Self::Known(p) => Some(p),
            _ => None,
        }
    }
}

/// A dismissable message for the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Notice {
    /// "My Location" was pressed but no position is known
    LocationUnavailable,
}

impl Notice {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::LocationUnavailable => "Your location is not available",
        }
    }
}

/// What asked for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// First tick after the scheduler starts
    Startup,
    /// Periodic refresh
    Tick,
    /// The user pressed Apply
    Apply,
}

impl fmt::Display for FetchOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Tick => "tick",
            Self::Apply => "apply",
        })
    }
}

/// Everything that can happen to a session.
#[derive(Debug, Clone)]
pub enum Action {
    SetHoursBack(HoursBack),
    SetMinMagnitude(MagnitudeThreshold),
    SetFilters(FilterState),
    RequestFetch(FetchOrigin),
    FetchCompleted {
        seq: u64,
        result: Result<Vec<RenderableEvent>, FailureReason>,
        completed_at: DateTime<Utc>,
    },
    MapClicked(LatLon),
    LocateMe,
    DismissNotice,
    RequestLocation,
    LocationResolved(Option<LatLon>),
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Query the feed with `filter`; report back with the same `seq`
    Fetch { seq: u64, filter: FilterState },
    /// Ask the position source once
    LocateUser,
}

/// The state a single map session owns.
#[derive(Debug, Clone, Default)]
pub struct Session {
    filter: FilterState,
    view: ViewState,
    location: LocationState,
    outcome: FetchOutcome,
    events: Arc<Vec<RenderableEvent>>,
    dispatched_seq: u64,
    committed_seq: u64,
    updated_at: Option<DateTime<Utc>>,
    notice: Option<Notice>,
}

impl Session {
    #[must_use]
    pub fn new(filter: FilterState, view: ViewState) -> Self {
        Self {
            filter,
            view,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn filter(&self) -> FilterState {
        self.filter
    }

    #[must_use]
    pub const fn view(&self) -> ViewState {
        self.view
    }

    #[must_use]
    pub const fn user_location(&self) -> Option<LatLon> {
        self.location.position()
    }

    #[must_use]
    pub const fn outcome(&self) -> &FetchOutcome {
        &self.outcome
    }

    #[must_use]
    pub const fn notice(&self) -> Option<Notice> {
        self.notice
    }

    /// True while any dispatched fetch is newer than the last committed one.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.dispatched_seq > self.committed_seq
    }

    /// Apply one action and return the effects it requests.
    pub fn apply(&mut self, action: Action) -> Vec<Effect> {
        match action {
            Action::SetHoursBack(hours) => {
                self.filter.hours_back = hours;
                Vec::new()
            }
            Action::SetMinMagnitude(min) => {
                self.filter.min_magnitude = min;
                Vec::new()
            }
            Action::SetFilters(filter) => {
                self.filter = filter;
                Vec::new()
            }
            Action::RequestFetch(origin) => {
                self.dispatched_seq += 1;
                self.outcome = FetchOutcome::Loading;
                debug!(seq = self.dispatched_seq, %origin, "dispatching fetch");
                vec![Effect::Fetch {
                    seq: self.dispatched_seq,
                    filter: self.filter,
                }]
            }
            Action::FetchCompleted {
                seq,
                result,
                completed_at,
            } => {
                self.commit(seq, result, completed_at);
                Vec::new()
            }
            Action::MapClicked(point) => {
                self.view.center = point;
                Vec::new()
            }
            Action::LocateMe => {
                if let Some(position) = self.location.position() {
                    self.view = ViewState {
                        center: position,
                        zoom: LOCATE_ZOOM,
                    };
                    self.notice = None;
                } else {
                    self.notice = Some(Notice::LocationUnavailable);
                }
                Vec::new()
            }
            Action::DismissNotice => {
                self.notice = None;
                Vec::new()
            }
            Action::RequestLocation => {
                if self.location == LocationState::NotRequested {
                    self.location = LocationState::Pending;
                    vec![Effect::LocateUser]
                } else {
                    Vec::new()
                }
            }
            Action::LocationResolved(found) => {
                if self.location == LocationState::Pending {
                    self.location = found.map_or(LocationState::Unavailable, LocationState::Known);
                }
                Vec::new()
            }
        }
    }

    /// Commit a fetch result only if it answers the most recent dispatch.
    fn commit(
        &mut self,
        seq: u64,
        result: Result<Vec<RenderableEvent>, FailureReason>,
        completed_at: DateTime<Utc>,
    ) {
        if seq != self.dispatched_seq || seq <= self.committed_seq {
            debug!(seq, latest = self.dispatched_seq, "discarding stale fetch result");
            return;
        }
        self.committed_seq = seq;

        match result {
            Ok(events) => {
                info!(seq, count = events.len(), "events updated");
                self.events = Arc::new(events);
                self.outcome = FetchOutcome::Success(Arc::clone(&self.events));
                self.updated_at = Some(completed_at);
            }
            Err(reason) => {
                warn!(seq, %reason, "fetch failed; waiting for next refresh");
                self.outcome = FetchOutcome::Failure(reason);
            }
        }
    }

    /// Read-only copy of everything the map view draws.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            filter: self.filter,
            view: self.view,
            user_location: self.location.position(),
            events: Arc::clone(&self.events),
            outcome: self.outcome.as_str(),
            loading: self.is_loading(),
            error: match self.outcome {
                FetchOutcome::Failure(reason) => Some(reason),
                _ => None,
            },
            notice: self.notice,
            updated_at: self.updated_at,
        }
    }
}

/// What the map view renders.
///
/// `events` is the list from the most recent successful fetch and stays in
/// place while a refresh is loading or after one fails.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub filter: FilterState,
    pub view: ViewState,
    pub user_location: Option<LatLon>,
    pub events: Arc<Vec<RenderableEvent>>,
    pub outcome: &'static str,
    pub loading: bool,
    pub error: Option<FailureReason>,
    pub notice: Option<Notice>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> RenderableEvent {
        RenderableEvent {
            id: id.into(),
            lat: 0.0,
            lon: 0.0,
            depth: None,
            magnitude: Some(3.0),
            place: "Test".into(),
            occurred_at: None,
            detail_url: None,
        }
    }

    fn dispatch(session: &mut Session) -> u64 {
        match session.apply(Action::RequestFetch(FetchOrigin::Apply)).as_slice() {
            [Effect::Fetch { seq, .. }] => *seq,
            other => panic!("unexpected effects {other:?}"),
        }
    }

    fn complete(session: &mut Session, seq: u64, result: Result<Vec<RenderableEvent>, FailureReason>) {
        session.apply(Action::FetchCompleted {
            seq,
            result,
            completed_at: Utc::now(),
        });
    }

    fn committed_ids(session: &Session) -> Vec<String> {
        match session.outcome() {
            FetchOutcome::Success(events) => events.iter().map(|e| e.id.clone()).collect(),
            other => panic!("expected success, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_edit_does_not_fetch() {
        let mut session = Session::default();
        assert!(session.apply(Action::SetHoursBack(HoursBack::new(72).unwrap())).is_empty());
        assert!(session.apply(Action::SetMinMagnitude(MagnitudeThreshold::M6_0)).is_empty());
        assert_eq!(session.filter().hours_back.get(), 72);
        assert_eq!(session.filter().min_magnitude, MagnitudeThreshold::M6_0);
        assert_eq!(session.outcome(), &FetchOutcome::Idle);
    }

    #[test]
    fn test_fetch_uses_current_filter_and_sets_loading() {
        let mut session = Session::default();
        session.apply(Action::SetHoursBack(HoursBack::new(6).unwrap()));
        let effects = session.apply(Action::RequestFetch(FetchOrigin::Startup));
        assert_eq!(
            effects,
            vec![Effect::Fetch {
                seq: 1,
                filter: session.filter()
            }]
        );
        assert_eq!(session.outcome(), &FetchOutcome::Loading);
        assert!(session.is_loading());
    }

    #[test]
    fn test_newer_result_wins_when_older_resolves_last() {
        let mut session = Session::default();
        let r1 = dispatch(&mut session);
        let r2 = dispatch(&mut session);
        assert!(r2 > r1);

        complete(&mut session, r2, Ok(vec![event("from-r2")]));
        complete(&mut session, r1, Ok(vec![event("from-r1")]));

        assert_eq!(committed_ids(&session), vec!["from-r2"]);
        assert!(!session.is_loading());
    }

    #[test]
    fn test_stale_failure_does_not_clobber_success() {
        let mut session = Session::default();
        let r1 = dispatch(&mut session);
        let r2 = dispatch(&mut session);
        complete(&mut session, r2, Ok(vec![]));
        complete(&mut session, r1, Err(FailureReason::Network));
        assert_eq!(session.outcome(), &FetchOutcome::Success(Arc::new(vec![])));
    }

    #[test]
    fn test_older_result_discarded_while_newer_pending() {
        let mut session = Session::default();
        let seq = dispatch(&mut session);
        complete(&mut session, seq, Ok(vec![event("shown")]));

        let r1 = dispatch(&mut session);
        session.apply(Action::SetMinMagnitude(MagnitudeThreshold::M6_0));
        let r2 = dispatch(&mut session);

        complete(&mut session, r1, Ok(vec![event("stale-r1")]));
        assert_eq!(session.outcome(), &FetchOutcome::Loading);
        assert!(session.is_loading());
        let snapshot = session.snapshot();
        assert_eq!(snapshot.outcome, "loading");
        assert_eq!(snapshot.events[0].id, "shown");

        complete(&mut session, r2, Ok(vec![event("from-r2")]));
        assert_eq!(committed_ids(&session), vec!["from-r2"]);
        assert!(!session.is_loading());
    }

    #[test]
    fn test_older_failure_ignored_while_newer_pending() {
        let mut session = Session::default();
        let r1 = dispatch(&mut session);
        let _r2 = dispatch(&mut session);
        complete(&mut session, r1, Err(FailureReason::Network));
        assert_eq!(session.outcome(), &FetchOutcome::Loading);
        assert_eq!(session.snapshot().error, None);
    }

    #[test]
    fn test_empty_success_is_not_failure() {
        let mut session = Session::default();
        let seq = dispatch(&mut session);
        complete(&mut session, seq, Ok(Vec::new()));
        assert_eq!(session.outcome(), &FetchOutcome::Success(Arc::new(Vec::new())));
        assert_eq!(session.snapshot().error, None);
    }

    #[test]
    fn test_failure_keeps_previous_events_visible() {
        let mut session = Session::default();
        let seq = dispatch(&mut session);
        complete(&mut session, seq, Ok(vec![event("kept")]));
        let seq = dispatch(&mut session);
        complete(&mut session, seq, Err(FailureReason::Parse));

        let snapshot = session.snapshot();
        assert_eq!(snapshot.error, Some(FailureReason::Parse));
        assert_eq!(snapshot.outcome, "failure");
        assert_eq!(snapshot.events.len(), 1);
    }

    #[test]
    fn test_results_replace_rather_than_merge() {
        let mut session = Session::default();
        let seq = dispatch(&mut session);
        complete(&mut session, seq, Ok(vec![event("a"), event("b")]));
        let seq = dispatch(&mut session);
        complete(&mut session, seq, Ok(vec![event("c")]));
        assert_eq!(committed_ids(&session), vec!["c"]);
    }

    #[test]
    fn test_unknown_sequence_ignored() {
        let mut session = Session::default();
        complete(&mut session, 7, Ok(vec![event("ghost")]));
        assert_eq!(session.outcome(), &FetchOutcome::Idle);
    }

    #[test]
    fn test_map_click_keeps_zoom() {
        let mut session = Session::new(FilterState::default(), ViewState::default());
        let before = session.view();
        session.apply(Action::MapClicked(LatLon::new(10.0, 20.0).unwrap()));
        assert_eq!(session.view().center, LatLon { lat: 10.0, lon: 20.0 });
        assert_eq!(session.view().zoom, before.zoom);
    }

    #[test]
    fn test_fetch_result_does_not_move_view() {
        let mut session = Session::default();
        let before = session.view();
        let seq = dispatch(&mut session);
        complete(&mut session, seq, Ok(vec![event("x")]));
        assert_eq!(session.view(), before);
    }

    #[test]
    fn test_locate_without_location_raises_notice() {
        let mut session = Session::default();
        let before = session.view();
        session.apply(Action::LocateMe);
        assert_eq!(session.notice(), Some(Notice::LocationUnavailable));
        assert_eq!(session.view(), before);

        session.apply(Action::DismissNotice);
        assert_eq!(session.notice(), None);
    }

    #[test]
    fn test_locate_with_location_recenters() {
        let mut session = Session::default();
        let here = LatLon::new(-33.9, 151.2).unwrap();
        assert_eq!(session.apply(Action::RequestLocation), vec![Effect::LocateUser]);
        session.apply(Action::LocationResolved(Some(here)));
        session.apply(Action::LocateMe);
        assert_eq!(session.view(), ViewState { center: here, zoom: LOCATE_ZOOM });
        assert_eq!(session.notice(), None);
    }

    #[test]
    fn test_location_requested_once_and_never_replaced() {
        let mut session = Session::default();
        let first = LatLon::new(1.0, 1.0).unwrap();
        assert_eq!(session.apply(Action::RequestLocation), vec![Effect::LocateUser]);
        session.apply(Action::LocationResolved(Some(first)));
        assert!(session.apply(Action::RequestLocation).is_empty());
        session.apply(Action::LocationResolved(Some(LatLon::new(2.0, 2.0).unwrap())));
        assert_eq!(session.user_location(), Some(first));
    }

    #[test]
    fn test_failed_location_stays_unset() {
        let mut session = Session::default();
        session.apply(Action::RequestLocation);
        session.apply(Action::LocationResolved(None));
        assert_eq!(session.user_location(), None);
        assert!(session.apply(Action::RequestLocation).is_empty());
        assert_eq!(session.notice(), None);
    }
}
