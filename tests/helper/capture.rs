//! Tracing layer recording which sync span each fetch ran under

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// `artifact_id` of an `artifact_sync` span, kept in the span's extensions
struct SpanArtifactId(String);

#[derive(Default)]
struct FieldVisitor {
    artifact_id: Option<String>,
    fetched: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "artifact_id" => self.artifact_id = Some(value.to_string()),
            "fetched" => self.fetched = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "artifact_id" => self.artifact_id = Some(format!("{:?}", value)),
            "fetched" => self.fetched = Some(format!("{:?}", value)),
            _ => {}
        }
    }
}

/// A fetch as seen from inside the publisher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFetch {
    /// `artifact_id` of the innermost enclosing sync span, if any
    pub span_artifact_id: Option<String>,
    /// Name of the artifact the publisher was asked for
    pub fetched: String,
}

#[derive(Clone, Default)]
pub struct FetchCapture {
    fetches: Arc<Mutex<Vec<CapturedFetch>>>,
}

impl FetchCapture {
    /// Captured fetches of artifacts whose name starts with `prefix`
    pub fn fetches_of(&self, prefix: &str) -> Vec<CapturedFetch> {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.fetched.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl<S> Layer<S> for FetchCapture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(artifact_id), Some(span)) = (visitor.artifact_id, ctx.span(id)) {
            span.extensions_mut().insert(SpanArtifactId(artifact_id));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let Some(fetched) = visitor.fetched else {
            return;
        };

        let span_artifact_id = ctx.event_scope(event).and_then(|scope| {
            scope
                .into_iter()
                .find_map(|span| span.extensions().get::<SpanArtifactId>().map(|a| a.0.clone()))
        });
        self.fetches.lock().unwrap().push(CapturedFetch {
            span_artifact_id,
            fetched,
        });
    }
}

/// Install the capture layer as the global subscriber of this test binary
///
/// Other tests in the same binary are captured too; filter by artifact name.
pub fn fetch_capture() -> &'static FetchCapture {
    static CAPTURE: OnceLock<FetchCapture> = OnceLock::new();
    CAPTURE.get_or_init(|| {
        let capture = FetchCapture::default();
        tracing_subscriber::registry()
            .with(capture.clone())
            .try_init()
            .unwrap();
        capture
    })
}
