/// Staff queue management: status changes, removals and the session gate.
pub mod admin_service;
/// Shared admin PIN check and token bookkeeping.
pub mod auth_service;
/// Song suggestions offered on the request form.
pub mod catalog_service;
/// Storage read/write probe behind the "test connection" action.
pub mod diagnostics_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Staff notification through a messaging deep link.
pub mod handoff;
/// Health check service.
pub mod health_service;
/// Read-only session gate information for patrons.
pub mod public_service;
/// Reload-and-publish of the live queue snapshot.
pub mod queue_sync;
/// Patron request lifecycle.
pub mod request_service;
/// Server-Sent Events streaming of the live queue.
pub mod sse_service;
/// Storage connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
