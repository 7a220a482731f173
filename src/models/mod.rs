mod api;

pub use api::{
    CapabilityStatus, EventPage, EventSummary, HealthResponse, IdentityResponse,
    IngestEventRequest, IngestEventResponse, PeriodQuery,
};
