//! Scanned context collector
//!
//! Turns the flat URI list of each scan into discrete added/removed events
//! relative to the set of contexts it already knows about. The known set is
//! owned by the collector alone and only changes through [`Collector::update`]
//! and [`Collector::clear_cache`].

use std::collections::BTreeSet;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info};

use crate::device::ContextUri;
use crate::discovery::events::{DiscoveryEvent, ScanDiff};

/// Callback invoked with the URI of an added or removed context
pub type UriCallback = Box<dyn FnMut(&ContextUri) + Send>;

/// Diffs successive scans and notifies subscribers
///
/// Subscribers are called synchronously, on the thread that calls `update`,
/// in registration order. Channel subscribers whose receiver was dropped are
/// pruned on the next emission.
#[derive(Default)]
pub struct Collector {
    /// Contexts believed present after the last update
    known: BTreeSet<ContextUri>,
    /// "context added" subscribers
    on_added: Vec<UriCallback>,
    /// "context removed" subscribers
    on_removed: Vec<UriCallback>,
    /// Channel subscribers receiving both kinds of events
    senders: Vec<Sender<DiscoveryEvent>>,
}

impl Collector {
    /// Create a collector with an empty known set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for contexts that appear
    pub fn on_added<F>(&mut self, callback: F)
    where
        F: FnMut(&ContextUri) + Send + 'static,
    {
        self.on_added.push(Box::new(callback));
    }

    /// Register a callback for contexts that disappear
    pub fn on_removed<F>(&mut self, callback: F)
    where
        F: FnMut(&ContextUri) + Send + 'static,
    {
        self.on_removed.push(Box::new(callback));
    }

    /// Forward every event to an existing channel
    pub fn add_sender(&mut self, sender: Sender<DiscoveryEvent>) {
        self.senders.push(sender);
    }

    /// Open a new channel that receives every event
    pub fn subscribe(&mut self) -> Receiver<DiscoveryEvent> {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    /// Apply the URIs seen by the latest scan
    ///
    /// Duplicates collapse and order is irrelevant. Every URI not known
    /// before is reported added, every known URI missing from `current` is
    /// reported removed, then the known set becomes exactly `current`.
    pub fn update<'a, I>(&mut self, current: I) -> ScanDiff
    where
        I: IntoIterator<Item = &'a ContextUri>,
    {
        let current: BTreeSet<ContextUri> = current.into_iter().cloned().collect();

        let diff = ScanDiff {
            added: current.difference(&self.known).cloned().collect(),
            removed: self.known.difference(&current).cloned().collect(),
        };

        for uri in &diff.added {
            info!("Context added: {}", uri);
            for callback in self.on_added.iter_mut() {
                callback(uri);
            }
            self.broadcast(DiscoveryEvent::Added(uri.clone()));
        }

        for uri in &diff.removed {
            info!("Context removed: {}", uri);
            for callback in self.on_removed.iter_mut() {
                callback(uri);
            }
            self.broadcast(DiscoveryEvent::Removed(uri.clone()));
        }

        self.known = current;
        diff
    }

    /// Forget every known context without emitting anything
    ///
    /// The next `update` reports everything it sees as added.
    pub fn clear_cache(&mut self) {
        debug!("Clearing {} known context(s)", self.known.len());
        self.known.clear();
    }

    /// Contexts currently believed present, in URI order
    pub fn known(&self) -> impl Iterator<Item = &ContextUri> + '_ {
        self.known.iter()
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.known.contains(uri)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Number of registered callbacks plus live channel subscribers
    pub fn subscriber_count(&self) -> usize {
        self.senders.len() + self.on_added.len() + self.on_removed.len()
    }

    fn broadcast(&mut self, event: DiscoveryEvent) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("known", &self.known)
            .field("on_added", &self.on_added.len())
            .field("on_removed", &self.on_removed.len())
            .field("senders", &self.senders.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn uris(list: &[&str]) -> Vec<ContextUri> {
        list.iter().map(|s| ContextUri::new(s).unwrap()).collect()
    }

    fn known(collector: &Collector) -> Vec<String> {
        collector.known().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_update_dedups_and_reports_added() {
        let mut collector = Collector::new();
        let diff = collector.update(&uris(&["usb:1.2.3", "usb:1.2.3", "ip:192.168.1.1"]));

        assert_eq!(diff.added.len(), 2);
        assert!(diff.removed.is_empty());
        assert_eq!(known(&collector), vec!["ip:192.168.1.1", "usb:1.2.3"]);
    }

    #[test]
    fn test_repeat_update_is_silent() {
        let mut collector = Collector::new();
        let input = uris(&["usb:1.2.3", "usb:1.2.3", "ip:192.168.1.1"]);
        collector.update(&input);

        let diff = collector.update(&input);
        assert!(diff.is_empty());
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn test_shrinking_scan_reports_removed() {
        let mut collector = Collector::new();
        collector.update(&uris(&["usb:1.2.3", "ip:192.168.1.1"]));

        let diff = collector.update(&uris(&["usb:1.2.3"]));
        assert!(diff.added.is_empty());
        assert_eq!(diff.removed, uris(&["ip:192.168.1.1"]));
        assert_eq!(known(&collector), vec!["usb:1.2.3"]);

        let diff = collector.update(&uris(&[]));
        assert_eq!(diff.removed, uris(&["usb:1.2.3"]));
        assert!(collector.is_empty());
    }

    #[test]
    fn test_clear_cache_is_silent() {
        let mut collector = Collector::new();
        let rx = collector.subscribe();
        let removed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&removed);
        collector.on_removed(move |uri| sink.lock().unwrap().push(uri.to_string()));

        collector.clear_cache();
        assert!(collector.is_empty());
        assert!(rx.try_recv().is_err());

        collector.update(&uris(&["usb:1.2.3", "ip:192.168.1.1"]));
        assert_eq!(rx.try_iter().count(), 2);

        collector.clear_cache();
        assert!(collector.is_empty());
        assert!(rx.try_recv().is_err());
        assert!(removed.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clear_then_update_reports_everything_added() {
        let mut collector = Collector::new();
        let input = uris(&["usb:1", "usb:2", "ip:10.0.0.2"]);
        collector.update(&input);

        collector.clear_cache();
        let diff = collector.update(&input);
        assert_eq!(diff.added.len(), 3);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_added_and_removed_are_disjoint() {
        let mut collector = Collector::new();
        collector.update(&uris(&["usb:1", "usb:2", "usb:3"]));

        let diff = collector.update(&uris(&["usb:3", "usb:4", "usb:4", "usb:1"]));
        assert_eq!(diff.added, uris(&["usb:4"]));
        assert_eq!(diff.removed, uris(&["usb:2"]));
        assert!(diff.added.iter().all(|u| !diff.removed.contains(u)));
    }

    #[test]
    fn test_known_set_ignores_input_order() {
        let mut a = Collector::new();
        let mut b = Collector::new();
        a.update(&uris(&["usb:9", "ip:1.1.1.1", "usb:2"]));
        b.update(&uris(&["usb:2", "usb:9", "ip:1.1.1.1", "usb:2"]));
        assert_eq!(known(&a), known(&b));
    }

    #[test]
    fn test_callbacks_fire_per_uri() {
        let mut collector = Collector::new();
        let added = Arc::new(Mutex::new(Vec::new()));
        let removed = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&added);
        collector.on_added(move |uri| sink.lock().unwrap().push(uri.to_string()));
        let sink = Arc::clone(&removed);
        collector.on_removed(move |uri| sink.lock().unwrap().push(uri.to_string()));

        collector.update(&uris(&["usb:1", "usb:2"]));
        collector.update(&uris(&["usb:2"]));

        assert_eq!(*added.lock().unwrap(), vec!["usb:1", "usb:2"]);
        assert_eq!(*removed.lock().unwrap(), vec!["usb:1"]);
    }

    #[test]
    fn test_channel_subscribers() {
        let mut collector = Collector::new();
        let rx = collector.subscribe();

        collector.update(&uris(&["usb:1"]));
        collector.update(&uris(&[]));

        let events: Vec<DiscoveryEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                DiscoveryEvent::Added(ContextUri::new("usb:1").unwrap()),
                DiscoveryEvent::Removed(ContextUri::new("usb:1").unwrap()),
            ]
        );
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let mut collector = Collector::new();
        let rx = collector.subscribe();
        let _kept = collector.subscribe();
        drop(rx);

        collector.update(&uris(&["usb:1"]));
        assert_eq!(collector.subscriber_count(), 1);
    }

    #[test]
    fn test_contains() {
        let mut collector = Collector::new();
        collector.update(&uris(&["usb:1.2.3"]));
        assert!(collector.contains("usb:1.2.3"));
        assert!(!collector.contains("usb:1.2.4"));
    }
}
