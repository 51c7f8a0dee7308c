//! JSON log lines with ECS field names.
//!
//! One object per event: `@timestamp`, `log.level`, `log.logger`, `message`,
//! the event's own fields, and the fields of every enclosing span (root
//! first, so inner spans win on conflicts). Span fields must be recorded with
//! `JsonFields` for the merge to pick them up.

use std::fmt;

use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::{FormatTime, SystemTime};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Default)]
pub struct EcsFormat {
    timer: SystemTime,
}

impl<S, N> FormatEvent<S, N> for EcsFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut obj = Map::new();

        let mut ts = String::new();
        self.timer.format_time(&mut Writer::new(&mut ts))?;
        obj.insert("@timestamp".into(), Value::String(ts));
        obj.insert(
            "log.level".into(),
            Value::String(meta.level().to_string().to_lowercase()),
        );
        obj.insert("log.logger".into(), Value::String(meta.target().to_string()));

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                let ext = span.extensions();
                let Some(fields) = ext.get::<FormattedFields<N>>() else { continue };
                let parsed = serde_json::from_str::<Value>(fields.fields.as_str());
                if let Ok(Value::Object(span_fields)) = parsed {
                    obj.extend(span_fields);
                }
            }
        }

        event.record(&mut JsonVisitor(&mut obj));

        writeln!(writer, "{}", Value::Object(obj))
    }
}

struct JsonVisitor<'a>(&'a mut Map<String, Value>);

impl JsonVisitor<'_> {
    fn put(&mut self, field: &Field, value: Value) {
        self.0.insert(field.name().to_string(), value);
    }
}

impl Visit for JsonVisitor<'_> {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, Value::from(format!("{value:?}")));
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::fmt::format::JsonFields;

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture_lines(f: impl FnOnce()) -> Vec<Value> {
        let buf = Capture::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .fmt_fields(JsonFields::new())
            .event_format(EcsFormat::default())
            .finish();

        tracing::subscriber::with_default(subscriber, f);

        let raw = buf.0.lock().unwrap().clone();
        String::from_utf8(raw)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn ecs_field_mapping() {
        let lines = capture_lines(|| {
            tracing::info!(name = "alice", "handling hello request");
        });

        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["message"], "handling hello request");
        assert_eq!(line["log.level"], "info");
        assert_eq!(line["name"], "alice");
        assert!(line["@timestamp"].as_str().is_some_and(|t| !t.is_empty()));
        assert!(line["log.logger"].as_str().is_some());
    }

    #[test]
    fn span_fields_are_merged() {
        let lines = capture_lines(|| {
            let span =
                tracing::info_span!("http.request", trace.id = "4bf92f3577b34da6a3ce929d0e0e4736");
            let _entered = span.enter();
            let inner = tracing::info_span!("updateRequestCount", span.kind = "custom");
            let _inner = inner.enter();
            tracing::error!(error = "disk full", "failed to update request count");
        });

        let line = &lines[0];
        assert_eq!(line["log.level"], "error");
        assert_eq!(line["trace.id"], "4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(line["span.kind"], "custom");
        assert_eq!(line["error"], "disk full");
    }
}
