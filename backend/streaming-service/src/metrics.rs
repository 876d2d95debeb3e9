use actix_web::HttpResponse;
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};

static PUBLISH_DECISIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "gatekeeper_publish_decisions_total",
            "Publish verification outcomes returned to the media ingester",
        ),
        &["outcome"],
    )
    .expect("failed to create gatekeeper_publish_decisions_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register gatekeeper_publish_decisions_total");
    counter
});

static SESSION_TOKENS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "gatekeeper_session_tokens_total",
            "Session tokens issued and revoked",
        ),
        &["action"],
    )
    .expect("failed to create gatekeeper_session_tokens_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register gatekeeper_session_tokens_total");
    counter
});

pub fn record_publish_decision(outcome: &str) {
    PUBLISH_DECISIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_token_issued() {
    SESSION_TOKENS_TOTAL.with_label_values(&["issued"]).inc();
}

pub fn record_token_revoked() {
    SESSION_TOKENS_TOTAL.with_label_values(&["revoked"]).inc();
}

pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_decisions_are_labelled() {
        let before = PUBLISH_DECISIONS_TOTAL
            .with_label_values(&["key_not_found"])
            .get();
        record_publish_decision("key_not_found");
        assert!(
            PUBLISH_DECISIONS_TOTAL
                .with_label_values(&["key_not_found"])
                .get()
                > before
        );
    }

    #[actix_web::test]
    async fn test_serve_metrics_exposes_counters() {
        record_token_issued();
        let response = serve_metrics().await;
        assert!(response.status().is_success());

        let body = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("gatekeeper_session_tokens_total"));
    }
}
