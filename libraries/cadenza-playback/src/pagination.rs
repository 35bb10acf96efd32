//! Pagination prefetcher
//!
//! Decides when the next page of a remote collection should be requested and
//! reconciles completed fetches with the live queue. The fetch itself runs as
//! a background task owned by the controller; this type only tracks the
//! cursor, the single in-flight request and its generation.

use cadenza_core::{CollectionId, CoreError, Track, TrackPage};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// Default remaining-track count that triggers a fetch
pub const DEFAULT_LOOK_AHEAD_THRESHOLD: usize = 3;

/// Continuation state of a paged collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationCursor {
    /// Collection being paged
    pub collection_id: CollectionId,
    /// Page to request next
    pub next_page: u32,
    /// Whether the catalog reported more pages
    pub has_more: bool,
}

impl PaginationCursor {
    /// Cursor after the first page of a collection has been loaded
    pub fn after_first_page(collection_id: CollectionId, has_more: bool) -> Self {
        Self {
            collection_id,
            next_page: 1,
            has_more,
        }
    }
}

/// A fetch the controller should run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    /// Cursor generation the fetch belongs to
    pub generation: u64,
    /// Collection to fetch from
    pub collection_id: CollectionId,
    /// Page number to fetch
    pub page: u32,
}

/// What to do with a completed fetch
#[derive(Debug)]
pub enum PageOutcome {
    /// Append these tracks; the cursor has already advanced
    Apply(Vec<Track>),
    /// The fetch belongs to a replaced or cleared queue
    Discarded,
    /// The fetch failed; the cursor is unchanged and will be retried
    Failed,
}

#[derive(Debug)]
struct InFlight {
    ticket: FetchTicket,
    abort: Option<AbortHandle>,
}

/// Look-ahead pagination state
#[derive(Debug)]
pub struct PaginationPrefetcher {
    cursor: Option<PaginationCursor>,
    in_flight: Option<InFlight>,
    generation: u64,
    look_ahead_threshold: usize,
}

impl PaginationPrefetcher {
    /// Prefetcher with the given look-ahead threshold
    pub fn new(look_ahead_threshold: usize) -> Self {
        Self {
            cursor: None,
            in_flight: None,
            generation: 0,
            look_ahead_threshold,
        }
    }

    /// Active cursor, if the queue is a paged collection
    pub fn cursor(&self) -> Option<&PaginationCursor> {
        self.cursor.as_ref()
    }

    /// Whether the active collection has more pages
    pub fn has_more(&self) -> bool {
        self.cursor.as_ref().is_some_and(|c| c.has_more)
    }

    /// Whether a fetch is outstanding
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Current cursor generation
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Install a new cursor (or none) for a replaced queue
    ///
    /// Any outstanding fetch is cancelled and its result will be discarded.
    pub fn reset(&mut self, cursor: Option<PaginationCursor>) {
        self.cancel();
        self.generation += 1;
        self.cursor = cursor;
    }

    /// Cancel the outstanding fetch, if any; idempotent
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            if let Some(abort) = in_flight.abort {
                abort.abort();
            }
            debug!(
                collection_id = %in_flight.ticket.collection_id,
                page = in_flight.ticket.page,
                "Cancelled page fetch"
            );
        }
    }

    /// Check the look-ahead threshold and claim a fetch if one is due
    ///
    /// `remaining` is the number of tracks after the current one. Returns
    /// `None` when the queue is not paged, the collection is exhausted, enough
    /// material remains, or a fetch is already in flight.
    pub fn evaluate(&mut self, remaining: usize) -> Option<FetchTicket> {
        if remaining > self.look_ahead_threshold {
            return None;
        }
        debug!(remaining, threshold = self.look_ahead_threshold, "Look-ahead threshold crossed");
        self.claim()
    }

    /// Claim a fetch regardless of the threshold
    pub fn force(&mut self) -> Option<FetchTicket> {
        self.claim()
    }

    fn claim(&mut self) -> Option<FetchTicket> {
        if self.in_flight.is_some() {
            return None;
        }
        let cursor = self.cursor.as_ref().filter(|c| c.has_more)?;
        let ticket = FetchTicket {
            generation: self.generation,
            collection_id: cursor.collection_id.clone(),
            page: cursor.next_page,
        };
        self.in_flight = Some(InFlight {
            ticket: ticket.clone(),
            abort: None,
        });
        Some(ticket)
    }

    /// Attach the running task so it can be cancelled with the cursor
    pub fn attach(&mut self, ticket: &FetchTicket, abort: AbortHandle) {
        match self.in_flight.as_mut() {
            Some(in_flight) if &in_flight.ticket == ticket => in_flight.abort = Some(abort),
            // Cursor already replaced between claim and spawn
            _ => abort.abort(),
        }
    }

    /// Reconcile a finished fetch with the current cursor
    ///
    /// Either the cursor advances and the tracks are returned for appending,
    /// or nothing changes.
    pub fn complete(
        &mut self,
        ticket: &FetchTicket,
        result: std::result::Result<TrackPage, CoreError>,
    ) -> PageOutcome {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| &in_flight.ticket == ticket)
            && ticket.generation == self.generation;

        if !current {
            debug!(
                collection_id = %ticket.collection_id,
                page = ticket.page,
                "Discarding stale page"
            );
            return PageOutcome::Discarded;
        }
        self.in_flight = None;

        let Some(cursor) = self.cursor.as_mut() else {
            return PageOutcome::Discarded;
        };

        match result {
            Ok(page) => {
                cursor.next_page = page.next_page.max(ticket.page + 1);
                cursor.has_more = page.has_more;
                debug!(
                    collection_id = %cursor.collection_id,
                    page = ticket.page,
                    tracks = page.tracks.len(),
                    has_more = cursor.has_more,
                    "Page fetched"
                );
                PageOutcome::Apply(page.tracks)
            }
            Err(e) => {
                warn!(
                    collection_id = %cursor.collection_id,
                    page = ticket.page,
                    error = %e,
                    "Page fetch failed, will retry on next threshold crossing"
                );
                PageOutcome::Failed
            }
        }
    }
}

impl Default for PaginationPrefetcher {
    fn default() -> Self {
        Self::new(DEFAULT_LOOK_AHEAD_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadenza_core::TrackId;

    fn cursor() -> PaginationCursor {
        PaginationCursor::after_first_page(CollectionId::new("pl-1"), true)
    }

    fn page(ids: &[&str], has_more: bool, next_page: u32) -> TrackPage {
        TrackPage {
            tracks: ids
                .iter()
                .map(|id| Track::new(TrackId::new(*id), format!("https://cdn/{id}"), *id))
                .collect(),
            has_more,
            next_page,
        }
    }

    #[test]
    fn no_cursor_never_fetches() {
        let mut prefetcher = PaginationPrefetcher::default();
        assert!(prefetcher.evaluate(0).is_none());
    }

    #[test]
    fn threshold_crossing_claims_exactly_one_fetch() {
        let mut prefetcher = PaginationPrefetcher::new(3);
        prefetcher.reset(Some(cursor()));

        // Queue length 10, current index 7 -> 2 remaining
        let ticket = prefetcher.evaluate(10 - 7 - 1).unwrap();
        assert_eq!(ticket.page, 1);
        assert!(prefetcher.is_in_flight());

        // Second trigger while outstanding
        assert!(prefetcher.evaluate(2).is_none());
        assert!(prefetcher.force().is_none());
    }

    #[test]
    fn above_threshold_does_not_fetch() {
        let mut prefetcher = PaginationPrefetcher::new(3);
        prefetcher.reset(Some(cursor()));
        assert!(prefetcher.evaluate(4).is_none());
        assert!(prefetcher.evaluate(3).is_some());
    }

    #[test]
    fn success_advances_cursor() {
        let mut prefetcher = PaginationPrefetcher::new(3);
        prefetcher.reset(Some(cursor()));
        let ticket = prefetcher.evaluate(0).unwrap();

        let outcome = prefetcher.complete(&ticket, Ok(page(&["x", "y"], false, 2)));
        match outcome {
            PageOutcome::Apply(tracks) => assert_eq!(tracks.len(), 2),
            other => panic!("expected Apply, got {other:?}"),
        }
        let cursor = prefetcher.cursor().unwrap();
        assert_eq!(cursor.next_page, 2);
        assert!(!cursor.has_more);
        assert!(!prefetcher.is_in_flight());

        // Exhausted collection
        assert!(prefetcher.evaluate(0).is_none());
    }

    #[test]
    fn failure_leaves_cursor_for_retry() {
        let mut prefetcher = PaginationPrefetcher::new(3);
        prefetcher.reset(Some(cursor()));
        let ticket = prefetcher.evaluate(1).unwrap();

        let outcome = prefetcher.complete(&ticket, Err(CoreError::network("timeout")));
        assert!(matches!(outcome, PageOutcome::Failed));
        assert_eq!(prefetcher.cursor(), Some(&cursor()));

        let retry = prefetcher.evaluate(1).unwrap();
        assert_eq!(retry.page, 1);
    }

    #[test]
    fn result_after_reset_is_discarded() {
        let mut prefetcher = PaginationPrefetcher::new(3);
        prefetcher.reset(Some(cursor()));
        let ticket = prefetcher.evaluate(0).unwrap();

        prefetcher.reset(Some(PaginationCursor::after_first_page(
            CollectionId::new("pl-2"),
            true,
        )));

        let outcome = prefetcher.complete(&ticket, Ok(page(&["x"], true, 2)));
        assert!(matches!(outcome, PageOutcome::Discarded));
        assert_eq!(prefetcher.cursor().unwrap().next_page, 1);
        assert_eq!(prefetcher.cursor().unwrap().collection_id.as_str(), "pl-2");
    }

    #[test]
    fn result_after_clear_is_discarded() {
        let mut prefetcher = PaginationPrefetcher::new(3);
        prefetcher.reset(Some(cursor()));
        let ticket = prefetcher.evaluate(0).unwrap();
        prefetcher.reset(None);

        assert!(matches!(
            prefetcher.complete(&ticket, Ok(page(&["x"], true, 2))),
            PageOutcome::Discarded
        ));
        assert!(prefetcher.cursor().is_none());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut prefetcher = PaginationPrefetcher::new(3);
        prefetcher.reset(Some(cursor()));
        prefetcher.evaluate(0).unwrap();
        prefetcher.cancel();
        prefetcher.cancel();
        assert!(!prefetcher.is_in_flight());
    }
}
