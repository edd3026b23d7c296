//! The command-dispatch worker pool and the per-message state machine it
//! runs, per §4.6 of the design.
//!
//! Grounded in `command_handler.c`'s dispatch loop: a fixed pool of OS
//! threads draining one shared queue, each message decoded and handled
//! without releasing the thread back to the pool mid-message.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, warn};

use crate::as_path::{self, AsPath, RelationshipDirection};
use crate::aspa::store::AspaTrustStore;
use crate::aspa::validator as aspa_validator;
use crate::client_map::ClientMap;
use crate::collaborators::{BgpsecValidator, RpkiValidator};
use crate::error::{Failed, ProtocolError};
use crate::ids::{AsNumber, ClientId, PathId, ProxyId, UpdateId};
use crate::notify::NotifySink;
use crate::outcome::{Afi, RequestFlags, ValidationOutcome, ValidationResult};
use crate::path_cache::AsPathCache;
use crate::prefix::Prefix;
use crate::protocol::{Pdu, PathPayload, PROTOCOL_VERSION};
use crate::queue::{Command, CommandQueue};
use crate::update_cache::{UpdateCache, UpdateData};

/// One item of work handed to a dispatch worker: a raw frame from
/// `client_id`'s connection (or [`ClientId::NONE`] before its `HELLO` is
/// processed), plus the handle to reply on.
pub struct ProxyMessage<H> {
    pub client_id: ClientId,
    pub handle: H,
    pub bytes: Vec<u8>,
}

/// Everything a dispatch worker needs to act on a message. Shared
/// read-only (beyond the interior-mutable caches) across every worker
/// thread in the pool.
pub struct DispatchContext<H> {
    pub path_cache: AsPathCache,
    pub aspa_store: AspaTrustStore,
    pub update_cache: UpdateCache,
    pub client_map: ClientMap<H>,
    pub rpki: Arc<dyn RpkiValidator>,
    pub bgpsec: Arc<dyn BgpsecValidator>,
    pub sync_on_connect: bool,
}

/// Spawns `thread_count` worker threads, each draining `queue` until it
/// receives its `Shutdown` sentinel.
pub fn spawn_workers<H: NotifySink>(
    ctx: Arc<DispatchContext<H>>,
    queue: Arc<CommandQueue<ProxyMessage<H>>>,
    thread_count: usize,
) -> Vec<JoinHandle<()>> {
    (0..thread_count)
        .map(|index| {
            let ctx = Arc::clone(&ctx);
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name(format!("dispatch-{index}"))
                .spawn(move || worker_loop(&ctx, &queue))
                .expect("failed to spawn dispatch worker thread")
        })
        .collect()
}

fn worker_loop<H: NotifySink>(ctx: &DispatchContext<H>, queue: &CommandQueue<ProxyMessage<H>>) {
    loop {
        match queue.pop() {
            Command::Shutdown => return,
            Command::ProxyMessage(message) => handle_message(ctx, message),
        }
    }
}

fn send<H: NotifySink>(handle: &H, pdu: Pdu) {
    let frame = pdu.encode();
    if !handle.send(&frame) {
        warn!("failed to deliver a reply to a client");
    }
}

fn send_error_and_goodbye<H: NotifySink>(handle: &H, error: ProtocolError) {
    send(handle, Pdu::Error { code: error.code() });
    send(handle, Pdu::Goodbye { keep_window: 0 });
}

fn handle_message<H: NotifySink>(ctx: &DispatchContext<H>, message: ProxyMessage<H>) {
    let pdu = match Pdu::decode(&message.bytes) {
        Ok(pdu) => pdu,
        Err(_) => {
            send_error_and_goodbye(&message.handle, ProtocolError::InvalidPacket);
            return;
        }
    };

    match pdu {
        Pdu::Hello { version, proxy_id } => {
            handle_hello(ctx, &message.handle, version, proxy_id);
        }
        Pdu::VerifyV4Request { flags, direction, prefix, origin, update_id, path, bgpsec_blob: _ } => {
            handle_verify(ctx, message.client_id, &message.handle, flags, direction, prefix, origin, update_id, path);
        }
        Pdu::VerifyV6Request { flags, direction, prefix, origin, update_id, path, bgpsec_blob: _ } => {
            handle_verify(ctx, message.client_id, &message.handle, flags, direction, prefix, origin, update_id, path);
        }
        Pdu::SignRequest => {
            debug!("SIGN_REQUEST received, not implemented; ignoring");
        }
        Pdu::Goodbye { keep_window } => {
            ctx.client_map.deactivate(message.client_id, false, keep_window);
        }
        Pdu::DeleteUpdate { keep_window, update_id } => {
            if !ctx.update_cache.delete_subscription(message.client_id, update_id, keep_window) {
                send(&message.handle, Pdu::Error { code: ProtocolError::UpdateNotFound.code() });
            }
        }
        Pdu::SyncRequest => {
            debug!("SYNC_REQUEST received from a client; full resync is server-initiated only");
        }
        Pdu::HelloResponse { .. } | Pdu::VerifyNotification { .. } | Pdu::Error { .. } => {
            send_error_and_goodbye(&message.handle, ProtocolError::InvalidPacket);
        }
    }
}

fn handle_hello<H: NotifySink>(
    ctx: &DispatchContext<H>,
    handle: &H,
    version: u16,
    proxy_id: ProxyId,
) -> ClientId {
    if version != PROTOCOL_VERSION {
        send_error_and_goodbye(handle, ProtocolError::WrongVersion);
        return ClientId::NONE;
    }

    if ctx.client_map.find_client_id(proxy_id).is_some() {
        send_error_and_goodbye(handle, ProtocolError::DuplicateProxyId);
        return ClientId::NONE;
    }

    let client_id = ctx.client_map.create_client_id();
    if !client_id.is_some() || !ctx.client_map.add_mapping(proxy_id, client_id, handle.clone()) {
        send_error_and_goodbye(handle, ProtocolError::InternalError);
        return ClientId::NONE;
    }

    send(handle, Pdu::HelloResponse { proxy_id });
    if ctx.sync_on_connect {
        send(handle, Pdu::SyncRequest);
    }
    client_id
}

#[allow(clippy::too_many_arguments)]
fn handle_verify<H: NotifySink>(
    ctx: &DispatchContext<H>,
    client_id: ClientId,
    handle: &H,
    flags: RequestFlags,
    direction: RelationshipDirection,
    prefix: Prefix,
    origin: AsNumber,
    update_id: UpdateId,
    path: Option<PathPayload>,
) {
    if flags.is_empty() {
        send(handle, Pdu::Error { code: ProtocolError::InvalidPacket.code() });
        return;
    }

    let afi = prefix.afi();
    let (as_path, path_id) = match &path {
        Some(payload) => {
            let id = as_path::path_id(&payload.hops);
            (Some(AsPath::new(payload.hops.clone(), payload.segment_kind)), id)
        }
        None => (None, PathId(0)),
    };

    let data = UpdateData { prefix, origin, path_id };
    let current = match ctx.update_cache.submit(update_id, data, client_id, ValidationResult::UNDEFINED) {
        Ok((_, current)) => current,
        Err(violation) => {
            violation.log();
            send(handle, Pdu::Error { code: ProtocolError::InternalError.code() });
            return;
        }
    };

    if let Some(as_path) = &as_path {
        if path_id != PathId(0) && ctx.path_cache.find(path_id).is_none() {
            ctx.path_cache.store(path_id, as_path.clone(), direction, afi, ValidationOutcome::Undefined);
        }
    }

    let mut new_result = ValidationResult::DO_NOT_USE;

    if flags.roa && current.roa == ValidationOutcome::Undefined {
        new_result.roa = run_validator(|| ctx.rpki.validate(&data.prefix, data.origin));
    }
    if flags.bgpsec && current.bgpsec == ValidationOutcome::Undefined {
        new_result.bgpsec = run_validator(|| ctx.bgpsec.validate_signature(&data));
    }
    if flags.aspa && current.aspa == ValidationOutcome::Undefined {
        new_result.aspa = compute_aspa(ctx, as_path.as_ref(), path_id, afi, direction);
    }

    ctx.update_cache.modify_result(update_id, new_result, false);
}

/// Computes the ASPA outcome for `as_path`, memoising it in the AS-path
/// cache by `path_id` rather than re-walking the same path on every
/// announcement that carries it. A cache hit whose stored result is
/// still `Undefined` (an entry created but not yet populated by a
/// racing worker) falls through to a fresh computation.
fn compute_aspa<H>(
    ctx: &DispatchContext<H>,
    as_path: Option<&AsPath>,
    path_id: PathId,
    afi: Afi,
    direction: RelationshipDirection,
) -> ValidationOutcome {
    let as_path = match as_path {
        Some(as_path) => as_path,
        None => return ValidationOutcome::Unknown,
    };

    if path_id != PathId(0) {
        if let Some(cached) = ctx.path_cache.find(path_id) {
            if cached.aspa_result != ValidationOutcome::Undefined {
                return cached.aspa_result;
            }
        }
    }

    let outcome = aspa_validator::validate(as_path, afi, direction, &ctx.aspa_store);
    if path_id != PathId(0) {
        ctx.path_cache.modify_aspa_result(path_id, outcome);
    }
    outcome
}

/// Runs a collaborator call, logging and falling back to `DoNotUse` (no
/// overwrite) on failure, per the upstream-failure policy in §7.
fn run_validator(call: impl FnOnce() -> Result<ValidationOutcome, Failed>) -> ValidationOutcome {
    match call() {
        Ok(outcome) => outcome,
        Err(Failed) => {
            error!("validator call failed; leaving axis unchanged");
            ValidationOutcome::DoNotUse
        }
    }
}
