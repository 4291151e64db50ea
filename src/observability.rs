use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "tutorhub_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "tutorhub_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "tutorhub_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "tutorhub_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "tutorhub_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "tutorhub_tenants_active";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "tutorhub_bookings_created_total";

/// Counter: booking state transitions. Labels: action.
pub const BOOKING_TRANSITIONS_TOTAL: &str = "tutorhub_booking_transitions_total";

/// Counter: sessions marked completed by the sweeper.
pub const SESSIONS_COMPLETED_TOTAL: &str = "tutorhub_sessions_completed_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertTutor { .. } => "insert_tutor",
        Command::UpdateTutor { .. } => "update_tutor",
        Command::InsertParent { .. } => "insert_parent",
        Command::InsertChild { .. } => "insert_child",
        Command::SetAvailability { .. } => "set_availability",
        Command::SelectTutors => "select_tutors",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectOpenSlots { .. } => "select_open_slots",
        Command::InsertBooking { .. } => "insert_booking",
        Command::TransitionBooking { .. } => "transition_booking",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectEarnings { .. } => "select_earnings",
        Command::Listen { .. } => "listen",
    }
}
