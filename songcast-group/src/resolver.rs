//! Candidate sender references for a receiver
//!
//! Order, most preferred first:
//!
//! 1. a direct-multicast reference found in the receiver's visible-senders list
//!    (exact title match on the sender's room or name, else the first one)
//! 2. the sender's own descriptor
//! 3. `ohz://<multicast group>/<sender identifier>`, always present
//!
//! Duplicate references keep their earliest position.

use openhome_api::SenderListing;

use crate::cache::NameCache;
use crate::control::DeviceControl;
use crate::device::{CandidateOrigin, DeviceNames, SenderCandidate};
use crate::policy::ResolverConfig;

const DIRECT_MULTICAST_PREFIX: &str = "ohz://";

pub struct CandidateResolver<'a> {
    config: &'a ResolverConfig,
}

impl<'a> CandidateResolver<'a> {
    pub fn new(config: &'a ResolverConfig) -> Self {
        Self { config }
    }

    /// Never fails: a step that yields nothing falls through to the next
    pub fn resolve(
        &self,
        sender: &dyn DeviceControl,
        receiver: &dyn DeviceControl,
        names: &mut NameCache,
    ) -> Vec<SenderCandidate> {
        let sender_names = names.names(sender);
        let mut candidates = Vec::new();

        if let Some(uri) = self.discover(receiver, &sender_names) {
            tracing::debug!(receiver = %receiver.device().token, "discovered sender {}", uri);
            candidates.push(SenderCandidate::new(uri, "", CandidateOrigin::Discovered));
        }

        match sender.sender_descriptor() {
            Ok(descriptor) => {
                if let Some(uri) = descriptor.uri {
                    candidates.push(SenderCandidate::new(
                        uri,
                        descriptor.metadata,
                        CandidateOrigin::SenderDescriptor,
                    ));
                }
            }
            Err(e) => tracing::debug!(sender = %sender.device().token, "no sender descriptor: {}", e),
        }

        candidates.push(SenderCandidate::synthesized(
            &self.config.multicast_group,
            sender.device().identifier(),
        ));

        dedup_by_uri(candidates)
    }

    fn discover(&self, receiver: &dyn DeviceControl, sender_names: &DeviceNames) -> Option<String> {
        let policy = &self.config.discovery;
        for attempt in 1..=policy.max_attempts {
            match receiver.visible_senders() {
                Ok(listings) => {
                    if let Some(uri) = pick_direct_multicast(&listings, sender_names) {
                        return Some(uri);
                    }
                    tracing::trace!(
                        receiver = %receiver.device().token,
                        "attempt {}: {} sender(s) visible, none usable",
                        attempt,
                        listings.len()
                    );
                }
                Err(e) => tracing::debug!(receiver = %receiver.device().token, "sender list unavailable: {}", e),
            }
            if attempt < policy.max_attempts {
                policy.wait();
            }
        }
        None
    }
}

/// Exact title match on room or name first, otherwise the first direct-multicast URI
pub fn pick_direct_multicast(listings: &[SenderListing], sender: &DeviceNames) -> Option<String> {
    let matches_sender = |title: &str| {
        sender.room.as_deref() == Some(title) || sender.name.as_deref() == Some(title)
    };

    let exact = listings
        .iter()
        .filter(|listing| listing.title.as_deref().is_some_and(matches_sender))
        .find_map(|listing| listing.uris_with_prefix(DIRECT_MULTICAST_PREFIX).next());

    exact
        .or_else(|| {
            listings
                .iter()
                .find_map(|listing| listing.uris_with_prefix(DIRECT_MULTICAST_PREFIX).next())
        })
        .cloned()
}

fn dedup_by_uri(candidates: Vec<SenderCandidate>) -> Vec<SenderCandidate> {
    let mut unique: Vec<SenderCandidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !unique.iter().any(|c| c.uri == candidate.uri) {
            unique.push(candidate);
        }
    }
    unique
}
