//! Request dispatch from decoded IPC messages to the allocation manager.

use std::sync::Arc;

use tracing::{debug, warn, Span};

use super::protocol::{
    decode_message, encode_response, AllocateRequest, AllocateResponse, HealthCheckResponse,
    HealthCheckType, IpcMessage, StatusReport,
};
use crate::health::{HealthChecker, HealthConfig};
use crate::memory::{AllocateOutcome, AllocationId, AllocationManager, PoolId, StoreError};
use crate::shutdown::ShutdownCoordinator;
use crate::telemetry::{OperationSpan, SpanExt};

/// Fallback frame when even the error reply cannot be encoded.
const ENCODE_FAILURE: &[u8] = br#"{"type":"error","code":500,"message":"encode failure"}"#;

/// Configuration for IPC handler.
#[derive(Debug, Clone, Default)]
pub struct IpcHandlerConfig {
    pub health: HealthConfig,
    /// Log the full pool table after every mutating request.
    pub log_status: bool,
}

/// Turns request frames into response frames.
pub struct IpcHandler {
    manager: Arc<AllocationManager>,
    shutdown: ShutdownCoordinator,
    health: HealthChecker,
    config: IpcHandlerConfig,
}

impl IpcHandler {
    pub fn new(
        manager: Arc<AllocationManager>,
        shutdown: ShutdownCoordinator,
        config: IpcHandlerConfig,
    ) -> Self {
        Self {
            manager,
            shutdown,
            health: HealthChecker::new(config.health.clone()),
            config,
        }
    }

    pub fn manager(&self) -> &Arc<AllocationManager> {
        &self.manager
    }

    /// Process one request frame and return the response frame.
    ///
    /// Never fails: malformed input becomes an `error` message with code 400.
    pub fn process(&self, bytes: &[u8]) -> Vec<u8> {
        let response = match decode_message(bytes) {
            Ok(message) => self.handle(message),
            Err(e) => {
                warn!(error = %e, "Rejected malformed frame");
                IpcMessage::error(400, e.to_string())
            }
        };
        encode_response(&response).unwrap_or_else(|_| ENCODE_FAILURE.to_vec())
    }

    /// Dispatch a decoded message.
    pub fn handle(&self, message: IpcMessage) -> IpcMessage {
        let span = OperationSpan::new(message.operation());
        let _enter = span.enter();

        let mutating = matches!(
            message,
            IpcMessage::CreatePool { .. }
                | IpcMessage::GrowPool { .. }
                | IpcMessage::DeletePool { .. }
                | IpcMessage::Allocate(_)
                | IpcMessage::Free { .. }
        );

        let response = match message {
            IpcMessage::CreatePool { id, size, address } => {
                record_pool(&span, id);
                let result = self.manager.add_pool(id, size, address);
                reply(&span, result, IpcMessage::PoolResponse)
            }

            IpcMessage::GrowPool { id, size } => {
                record_pool(&span, id);
                let result = self.manager.update_pool(id, size);
                reply(&span, result, IpcMessage::PoolResponse)
            }

            IpcMessage::DeletePool { id } => {
                record_pool(&span, id);
                let deleted = self.manager.delete_pool(id);
                reply(&span, Ok(deleted), |deleted| IpcMessage::DeleteResponse { deleted })
            }

            IpcMessage::Allocate(request) => self.handle_allocate(&span, request),

            IpcMessage::Free { allocation_id } => {
                let result = match allocation_id.parse::<AllocationId>() {
                    Ok(id) => self.manager.free(&id),
                    Err(_) => Err(StoreError::UnknownAllocation(allocation_id)),
                };
                reply(&span, result, |freed| IpcMessage::FreeResponse { freed })
            }

            IpcMessage::ReclaimRequest { id } => {
                record_pool(&span, id);
                let added = self.manager.request_reclaim(id);
                reply(&span, Ok(added), |added| IpcMessage::ReclaimAck { added })
            }

            IpcMessage::ReclaimCancel { id } => {
                record_pool(&span, id);
                self.manager.cancel_reclaim(id);
                reply(&span, Ok(id), |id| IpcMessage::ReclaimCancelled { id })
            }

            IpcMessage::ReclaimStatusRequest { id } => {
                record_pool(&span, id);
                let result = self.manager.reclaim_status(id);
                reply(&span, result, IpcMessage::ReclaimStatusResponse)
            }

            IpcMessage::ResponsiveReclaim { allocations } => {
                // Ids that do not parse cannot be live; drop them.
                let ids: Vec<AllocationId> = allocations
                    .iter()
                    .filter_map(|raw| raw.parse().ok())
                    .collect();
                let allocations = self.manager.responsive_reclaim(&ids);
                reply(&span, Ok(allocations), |allocations| {
                    IpcMessage::ResponsiveResponse { allocations }
                })
            }

            IpcMessage::StatusRequest => {
                let report = StatusReport {
                    pools: self.manager.pools(),
                    reclaiming: self.manager.reclaiming(),
                    allocations: self.manager.allocation_count(),
                };
                reply(&span, Ok(report), IpcMessage::StatusResponse)
            }

            IpcMessage::HealthCheck { check_type } => {
                let response = self.handle_health(check_type);
                reply(&span, Ok(response), IpcMessage::HealthResponse)
            }

            _ => {
                let result: Result<IpcMessage, &str> = Err("Unexpected message type");
                span.record_result(&result);
                IpcMessage::error(400, "Unexpected message type")
            }
        };

        if mutating && self.config.log_status {
            self.manager.log_status();
        }
        response
    }

    fn handle_allocate(&self, span: &Span, request: AllocateRequest) -> IpcMessage {
        let result = self
            .manager
            .allocate(request.memory, request.source_gpu)
            .map(|outcome| {
                let rejected = match &outcome {
                    AllocateOutcome::Granted(allocation) => {
                        record_pool(span, allocation.pool_id);
                        None
                    }
                    AllocateOutcome::InsufficientCapacity {
                        requested,
                        available,
                    } => Some(format!(
                        "insufficient capacity: requested {}, available {}",
                        requested, available
                    )),
                    AllocateOutcome::ReclaimBlocked(pool_id) => {
                        record_pool(span, *pool_id);
                        Some(format!("pool {} is pending reclaim", pool_id))
                    }
                };
                AllocateResponse {
                    allocation: outcome.into_allocation(),
                    rejected,
                }
            });
        reply(span, result, IpcMessage::AllocateResponse)
    }

    fn handle_health(&self, check_type: HealthCheckType) -> HealthCheckResponse {
        let state = self.shutdown.state();
        match check_type {
            HealthCheckType::Liveness => HealthCheckResponse {
                check_type,
                ok: self.health.is_alive(),
                report: None,
            },
            HealthCheckType::Readiness => HealthCheckResponse {
                check_type,
                ok: self.health.is_ready(state, self.manager.pools().len()),
                report: None,
            },
            HealthCheckType::Full => {
                let report = self.health.report(state, &self.manager);
                HealthCheckResponse {
                    check_type,
                    ok: report.ready,
                    report: Some(report),
                }
            }
        }
    }
}

fn record_pool(span: &Span, pool_id: PoolId) {
    span.record("pool_id", pool_id);
}

fn reply<T>(
    span: &Span,
    result: Result<T, StoreError>,
    on_ok: impl FnOnce(T) -> IpcMessage,
) -> IpcMessage {
    span.record_result(&result);
    match result {
        Ok(value) => on_ok(value),
        Err(e) => {
            if e.is_not_found() {
                debug!(error = %e, "Request referenced a missing entity");
            } else {
                warn!(error = %e, "Request rejected");
            }
            IpcMessage::error(e.status_code(), e.to_string())
        }
    }
}
