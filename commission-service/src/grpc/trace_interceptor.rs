//! gRPC trace context propagation interceptor.
//!
//! Extracts W3C trace context (traceparent/tracestate) from incoming gRPC
//! metadata and sets it as the parent of the current span.

use opentelemetry::propagation::TextMapPropagator;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tonic::{Request, Status};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

const TRACEPARENT_HEADER: &str = "traceparent";

/// A text map extractor for gRPC metadata.
struct MetadataExtractor<'a>(&'a tonic::metadata::MetadataMap);

impl opentelemetry::propagation::Extractor for MetadataExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0
            .keys()
            .filter_map(|k| {
                if let tonic::metadata::KeyRef::Ascii(key) = k {
                    Some(key.as_str())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// A tonic interceptor that extracts and propagates W3C trace context.
#[allow(clippy::result_large_err)]
pub fn trace_context_interceptor(request: Request<()>) -> Result<Request<()>, Status> {
    let extractor = MetadataExtractor(request.metadata());
    let propagator = TraceContextPropagator::new();
    let context = propagator.extract(&extractor);

    Span::current().set_parent(context);

    if tracing::enabled!(tracing::Level::DEBUG) {
        if let Some(traceparent) = request.metadata().get(TRACEPARENT_HEADER) {
            if let Ok(value) = traceparent.to_str() {
                tracing::debug!(traceparent = %value, "gRPC request with trace context");
            }
        }
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::propagation::Extractor;
    use tonic::metadata::MetadataMap;

    #[test]
    fn metadata_extractor_reads_traceparent() {
        let mut metadata = MetadataMap::new();
        metadata.insert(
            "traceparent",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
                .parse()
                .unwrap(),
        );

        let extractor = MetadataExtractor(&metadata);
        assert_eq!(
            extractor.get("traceparent"),
            Some("00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01")
        );
        assert_eq!(extractor.get("tracestate"), None);
    }

    #[test]
    fn metadata_extractor_lists_keys() {
        let mut metadata = MetadataMap::new();
        metadata.insert("traceparent", "value".parse().unwrap());
        metadata.insert("tracestate", "state".parse().unwrap());

        let extractor = MetadataExtractor(&metadata);
        let keys = extractor.keys();
        assert!(keys.contains(&"traceparent"));
        assert!(keys.contains(&"tracestate"));
    }
}
