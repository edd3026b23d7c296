//! The server: owns every shared structure and the worker pool that acts
//! on them, and drives their startup and shutdown sequence.
//!
//! Grounded in the `rtr` module's approach, which assembles a listener,
//! a shared history, and a notification sender into one unit the `rtrd`
//! command starts and lets run. Here the pieces are the command queue,
//! the dispatch pool, and the caches; the accept loop that would turn
//! raw sockets into [`crate::dispatch::ProxyMessage`]s is out of scope
//! (see [`crate::collaborators`]), so `Server` starts from an already
//! running [`CommandQueue`].

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::info;

use crate::aspa::store::AspaTrustStore;
use crate::client_map::ClientMap;
use crate::collaborators::{BgpsecValidator, RpkiChangeQueue, RpkiValidator};
use crate::config::Config;
use crate::dispatch::{self, DispatchContext, ProxyMessage};
use crate::notify::{Notifier, NotifySink};
use crate::path_cache::AsPathCache;
use crate::queue::CommandQueue;
use crate::update_cache::UpdateCache;

/// Everything the server needs besides its configuration: the two
/// validators this crate doesn't implement itself.
pub struct Collaborators {
    pub rpki: Arc<dyn RpkiValidator>,
    pub bgpsec: Arc<dyn BgpsecValidator>,
}

/// A running validation server.
///
/// Holds the dispatch worker pool's join handles and every shared cache
/// the workers act on. Dropping a `Server` without calling
/// [`Server::shutdown`] first leaves its worker threads running
/// detached -- always shut down explicitly.
pub struct Server<H: NotifySink> {
    ctx: Arc<DispatchContext<H>>,
    queue: Arc<CommandQueue<ProxyMessage<H>>>,
    workers: Vec<JoinHandle<()>>,
    rpki_changes: RpkiChangeQueue,
}

impl<H: NotifySink> Server<H> {
    /// Starts the dispatch worker pool. The caller owns handing incoming
    /// proxy bytes to the returned queue and periodically draining
    /// notifications via [`Server::notifier`].
    pub fn start(config: &Config, collaborators: Collaborators) -> Self {
        let ctx = Arc::new(DispatchContext {
            path_cache: AsPathCache::new(),
            aspa_store: AspaTrustStore::initialize(),
            update_cache: UpdateCache::new(),
            client_map: ClientMap::new(),
            rpki: collaborators.rpki,
            bgpsec: collaborators.bgpsec,
            sync_on_connect: config.sync_on_connect,
        });
        let queue = Arc::new(CommandQueue::new());
        let workers = dispatch::spawn_workers(
            Arc::clone(&ctx), Arc::clone(&queue), config.dispatch_threads,
        );
        info!("Started {} dispatch worker threads.", config.dispatch_threads);
        Server { ctx, queue, workers, rpki_changes: RpkiChangeQueue::new() }
    }

    /// The queue new proxy messages should be pushed onto.
    pub fn command_queue(&self) -> Arc<CommandQueue<ProxyMessage<H>>> {
        Arc::clone(&self.queue)
    }

    /// Trust-data change notifications awaiting re-delivery.
    pub fn rpki_changes(&self) -> &RpkiChangeQueue {
        &self.rpki_changes
    }

    /// Builds a [`Notifier`] over this server's update cache and client
    /// map. Borrowed rather than owned, so it can be constructed fresh
    /// by whatever thread is about to drain notifications.
    pub fn notifier(&self) -> Notifier<'_, H> {
        Notifier::new(&self.ctx.update_cache, &self.ctx.client_map)
    }

    /// Removes subscriptions and client slots past their retention
    /// window, and redelivers any trust-data changes queued since the
    /// last run. Intended to run from a dedicated maintenance thread on
    /// a fixed interval (e.g. every [`MAINTENANCE_INTERVAL`]), never
    /// from a dispatch worker.
    pub fn run_maintenance(&self) {
        let purged = self.ctx.update_cache.purge_expired();
        if purged > 0 {
            info!("Purged {purged} expired update-cache entries.");
        }
        let released = self.ctx.client_map.release_expired();
        if released > 0 {
            info!("Released {released} expired client slots.");
        }

        let notifier = self.notifier();
        let mut redelivered = 0;
        while let Some(update_id) = self.rpki_changes.pop() {
            if notifier.broadcast_one(update_id) {
                redelivered += 1;
            }
        }
        if redelivered > 0 {
            info!("Redelivered {redelivered} trust-data change notifications.");
        }
    }

    /// Drains the dispatch queue with one `Shutdown` sentinel per
    /// worker, then joins every worker thread. Blocks until all
    /// in-flight messages ahead of the sentinels have been handled.
    pub fn shutdown(self) {
        self.queue.shutdown(self.workers.len());
        for worker in self.workers {
            let _ = worker.join();
        }
        info!("Dispatch worker pool shut down.");
    }
}

/// How often a maintenance thread should call [`Server::run_maintenance`].
pub const MAINTENANCE_INTERVAL: Duration = Duration::from_secs(60);

#[cfg(test)]
mod test {
    use super::*;
    use crate::as_path::{RelationshipDirection, SegmentKind};
    use crate::collaborators::test_doubles::{FixedBgpsec, FixedRpki};
    use crate::ids::{AsNumber, ProxyId, UpdateId};
    use crate::outcome::{RequestFlags, ValidationOutcome};
    use crate::prefix::Prefix;
    use crate::protocol::{Pdu, PathPayload, PROTOCOL_VERSION};
    use crate::queue::Command;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use std::thread;

    #[derive(Clone)]
    struct RecordingSink(Arc<Mutex<Vec<Vec<u8>>>>);

    impl NotifySink for RecordingSink {
        fn send(&self, frame: &[u8]) -> bool {
            self.0.lock().unwrap().push(frame.to_vec());
            true
        }
    }

    fn test_config() -> Config {
        Config::from_arg_matches(
            &Config::config_args(clap::App::new("test")).get_matches_from(["test"]),
        )
    }

    #[test]
    fn end_to_end_verify_and_notify_round_trip() {
        let config = test_config();
        let collaborators = Collaborators {
            rpki: Arc::new(FixedRpki::new(ValidationOutcome::Valid)),
            bgpsec: Arc::new(FixedBgpsec { outcome: ValidationOutcome::Valid }),
        };
        let server: Server<RecordingSink> = Server::start(&config, collaborators);

        let handle = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        let queue = server.command_queue();

        queue.push(ProxyMessage {
            client_id: crate::ids::ClientId::NONE,
            handle: handle.clone(),
            bytes: Pdu::Hello { version: PROTOCOL_VERSION, proxy_id: ProxyId(1) }.encode().to_vec(),
        });

        // wait for the hello reply rather than racing the worker thread.
        for _ in 0..200 {
            if !handle.0.lock().unwrap().is_empty() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let frames = handle.0.lock().unwrap().clone();
        assert_eq!(frames.len(), 1);
        assert_eq!(Pdu::decode(&frames[0]).unwrap(), Pdu::HelloResponse { proxy_id: ProxyId(1) });

        server.shutdown();
    }

    #[test]
    fn shutdown_drains_pending_messages_before_joining() {
        let config = test_config();
        let collaborators = Collaborators {
            rpki: Arc::new(FixedRpki::new(ValidationOutcome::Valid)),
            bgpsec: Arc::new(FixedBgpsec { outcome: ValidationOutcome::Valid }),
        };
        let server: Server<RecordingSink> = Server::start(&config, collaborators);
        let handle = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        let queue = server.command_queue();

        for raw_proxy_id in 1..=5u32 {
            queue.push(ProxyMessage {
                client_id: crate::ids::ClientId::NONE,
                handle: handle.clone(),
                bytes: Pdu::Hello { version: PROTOCOL_VERSION, proxy_id: ProxyId(raw_proxy_id) }.encode().to_vec(),
            });
        }
        server.shutdown();
        assert_eq!(handle.0.lock().unwrap().len(), 5);
    }

    #[test]
    fn verify_request_through_queue_updates_default_keep_window_config() {
        let config = test_config();
        assert_eq!(config.default_keep_window, 900);
        let collaborators = Collaborators {
            rpki: Arc::new(FixedRpki::new(ValidationOutcome::Invalid)),
            bgpsec: Arc::new(FixedBgpsec { outcome: ValidationOutcome::Valid }),
        };
        let server: Server<RecordingSink> = Server::start(&config, collaborators);
        let handle = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        let queue = server.command_queue();

        queue.push(ProxyMessage {
            client_id: crate::ids::ClientId(1),
            handle: handle.clone(),
            bytes: Pdu::VerifyV4Request {
                flags: RequestFlags { roa: true, bgpsec: false, aspa: false },
                direction: RelationshipDirection::Upstream,
                prefix: Prefix::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
                origin: AsNumber(100),
                update_id: UpdateId(1),
                path: Some(PathPayload {
                    segment_kind: SegmentKind::Sequence,
                    hops: vec![AsNumber(100)],
                }),
                bgpsec_blob: bytes::Bytes::new(),
            }.encode().to_vec(),
        });

        for _ in 0..200 {
            if server.ctx.update_cache.get_result(UpdateId(1)).is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let (current, _, _) = server.ctx.update_cache.get_result(UpdateId(1)).unwrap();
        assert_eq!(current.roa, ValidationOutcome::Invalid);

        server.shutdown();
    }

    #[test]
    fn maintenance_redelivers_queued_trust_data_changes() {
        let config = test_config();
        let collaborators = Collaborators {
            rpki: Arc::new(FixedRpki::new(ValidationOutcome::Valid)),
            bgpsec: Arc::new(FixedBgpsec { outcome: ValidationOutcome::Valid }),
        };
        let server: Server<RecordingSink> = Server::start(&config, collaborators);
        let handle = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        let queue = server.command_queue();

        queue.push(ProxyMessage {
            client_id: crate::ids::ClientId::NONE,
            handle: handle.clone(),
            bytes: Pdu::Hello { version: PROTOCOL_VERSION, proxy_id: ProxyId(1) }.encode().to_vec(),
        });
        for _ in 0..200 {
            if server.ctx.client_map.find_client_id(ProxyId(1)).is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let client = server.ctx.client_map.find_client_id(ProxyId(1));
        handle.0.lock().unwrap().clear();

        queue.push(ProxyMessage {
            client_id: client,
            handle: handle.clone(),
            bytes: Pdu::VerifyV4Request {
                flags: RequestFlags { roa: true, bgpsec: false, aspa: false },
                direction: RelationshipDirection::Upstream,
                prefix: Prefix::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
                origin: AsNumber(100),
                update_id: UpdateId(1),
                path: None,
                bgpsec_blob: bytes::Bytes::new(),
            }.encode().to_vec(),
        });
        for _ in 0..200 {
            if server.ctx.update_cache.get_result(UpdateId(1)).is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        // Simulate an RPKI engine reporting that this UpdateID's ROA
        // outcome changed out-of-band: the maintenance loop, not a
        // dispatch worker, is what notices and redelivers it.
        server.rpki_changes().push(UpdateId(1));
        server.run_maintenance();

        assert_eq!(handle.0.lock().unwrap().len(), 1);
        assert_eq!(
            Pdu::decode(&handle.0.lock().unwrap()[0]).unwrap(),
            Pdu::VerifyNotification {
                axes: crate::outcome::AxesMask { roa: true, bgpsec: true, aspa: true },
                roa: ValidationOutcome::Valid,
                bgpsec: ValidationOutcome::Undefined,
                aspa: ValidationOutcome::Undefined,
                update_id: UpdateId(1),
            },
        );

        server.shutdown();
    }

    #[test]
    fn notification_fans_out_to_every_client_subscribed_to_the_update() {
        let config = test_config();
        let collaborators = Collaborators {
            rpki: Arc::new(FixedRpki::new(ValidationOutcome::Valid)),
            bgpsec: Arc::new(FixedBgpsec { outcome: ValidationOutcome::Valid }),
        };
        let server: Server<RecordingSink> = Server::start(&config, collaborators);
        let handle_a = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        let handle_b = RecordingSink(Arc::new(Mutex::new(Vec::new())));
        let queue = server.command_queue();

        queue.push(ProxyMessage {
            client_id: crate::ids::ClientId::NONE,
            handle: handle_a.clone(),
            bytes: Pdu::Hello { version: PROTOCOL_VERSION, proxy_id: ProxyId(1) }.encode().to_vec(),
        });
        queue.push(ProxyMessage {
            client_id: crate::ids::ClientId::NONE,
            handle: handle_b.clone(),
            bytes: Pdu::Hello { version: PROTOCOL_VERSION, proxy_id: ProxyId(2) }.encode().to_vec(),
        });
        for _ in 0..200 {
            if server.ctx.client_map.find_client_id(ProxyId(1)).is_some()
                && server.ctx.client_map.find_client_id(ProxyId(2)).is_some()
            {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        let client_a = server.ctx.client_map.find_client_id(ProxyId(1));
        let client_b = server.ctx.client_map.find_client_id(ProxyId(2));
        handle_a.0.lock().unwrap().clear();
        handle_b.0.lock().unwrap().clear();

        let verify = |client_id, handle: &RecordingSink| ProxyMessage {
            client_id,
            handle: handle.clone(),
            bytes: Pdu::VerifyV4Request {
                flags: RequestFlags { roa: true, bgpsec: false, aspa: false },
                direction: RelationshipDirection::Upstream,
                prefix: Prefix::v4(Ipv4Addr::new(10, 0, 0, 0), 24),
                origin: AsNumber(100),
                update_id: UpdateId(1),
                path: Some(PathPayload {
                    segment_kind: SegmentKind::Sequence,
                    hops: vec![AsNumber(100)],
                }),
                bgpsec_blob: bytes::Bytes::new(),
            }.encode().to_vec(),
        };

        // Both clients subscribe to the same UpdateID.
        queue.push(verify(client_a, &handle_a));
        queue.push(verify(client_b, &handle_b));

        for _ in 0..200 {
            if server.ctx.update_cache.get_result(UpdateId(1)).is_some() {
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }

        // A trust-data change recomputes the ASPA axis and the notifier
        // broadcasts it to both subscribed clients.
        let notifier = server.notifier();
        server.ctx.update_cache.modify_result(
            UpdateId(1),
            crate::outcome::ValidationResult::new(
                ValidationOutcome::DoNotUse,
                ValidationOutcome::DoNotUse,
                ValidationOutcome::Invalid,
            ),
            true,
        );
        assert_eq!(notifier.drain_and_broadcast(), 1);

        assert_eq!(handle_a.0.lock().unwrap().len(), 1);
        assert_eq!(handle_b.0.lock().unwrap().len(), 1);

        server.shutdown();
    }

    #[test]
    fn shutdown_with_no_pending_work_joins_immediately() {
        let config = test_config();
        let collaborators = Collaborators {
            rpki: Arc::new(FixedRpki::new(ValidationOutcome::Valid)),
            bgpsec: Arc::new(FixedBgpsec { outcome: ValidationOutcome::Valid }),
        };
        let server: Server<RecordingSink> = Server::start(&config, collaborators);
        server.shutdown();
    }

    #[test]
    fn command_queue_rejects_nothing_push_accepts_any_message() {
        let queue: CommandQueue<i32> = CommandQueue::new();
        queue.push(1);
        match queue.pop() {
            Command::ProxyMessage(v) => assert_eq!(v, 1),
            Command::Shutdown => panic!("unexpected shutdown"),
        }
    }
}
