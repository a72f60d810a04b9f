// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Optional OpenTelemetry instrumentation.
//!
//! Recording is off until [`enable`] is called. Without the `telemetry`
//! feature every function is a no-op.
#![cfg_attr(not(feature = "telemetry"), allow(dead_code))]

#[cfg(feature = "telemetry")]
mod otel {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    use opentelemetry::global;
    use opentelemetry::metrics::{Counter, Histogram};
    use opentelemetry::trace::SpanKind;
    use opentelemetry::{trace::Span as _, trace::Tracer, KeyValue};

    const METER_NAME: &str = "glint_engine";
    const TRACER_NAME: &str = "glint_engine";

    static ENABLED: AtomicBool = AtomicBool::new(false);
    static HANDLES: OnceLock<Handles> = OnceLock::new();

    struct Handles {
        tracer: opentelemetry::global::BoxedTracer,
        compile_hist: Histogram<f64>,
        compile_counter: Counter<u64>,
        pass_hist: Histogram<f64>,
        unresolved_counter: Counter<u64>,
    }

    impl Handles {
        fn new() -> Self {
            let meter = global::meter(METER_NAME);
            let compile_hist = meter
                .f64_histogram("glint.compile.duration_ms")
                .with_description("Template compile duration in milliseconds")
                .init();
            let compile_counter = meter
                .u64_counter("glint.compile.count")
                .with_description("Number of template compiles")
                .init();
            let pass_hist = meter
                .f64_histogram("glint.pass.duration_ms")
                .with_description("Duration of a single compiler pass in milliseconds")
                .init();
            let unresolved_counter = meter
                .u64_counter("glint.binding.unresolved")
                .with_description("Bindings kept as raw text during resolution")
                .init();
            let tracer = global::tracer(TRACER_NAME);
            Self {
                tracer,
                compile_hist,
                compile_counter,
                pass_hist,
                unresolved_counter,
            }
        }
    }

    fn handles() -> &'static Handles {
        HANDLES.get_or_init(Handles::new)
    }

    pub fn enable() {
        ENABLED.store(true, Ordering::Relaxed);
    }

    pub fn disable() {
        ENABLED.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    pub fn record_compile(template: &str, template_len: usize, duration: Duration, success: bool) {
        if !is_enabled() {
            return;
        }
        let hs = handles();
        let duration_ms = duration.as_secs_f64() * 1_000.0;
        let length = i64::try_from(template_len).unwrap_or(i64::MAX);
        let attrs = [
            KeyValue::new("template.name", template.to_string()),
            KeyValue::new("template.length", length),
            KeyValue::new("compile.success", success),
        ];
        hs.compile_counter.add(1, &attrs);
        hs.compile_hist.record(duration_ms, &attrs);
        let mut span = hs
            .tracer
            .span_builder("Template::compile")
            .with_kind(SpanKind::Internal)
            .start(&hs.tracer);
        span.set_attribute(KeyValue::new("template.name", template.to_string()));
        span.set_attribute(KeyValue::new("template.length", length));
        span.set_attribute(KeyValue::new("compile.duration_ms", duration_ms));
        span.set_attribute(KeyValue::new("compile.success", success));
        span.end();
    }

    pub fn record_pass(pass: &'static str, duration: Duration) {
        if !is_enabled() {
            return;
        }
        handles().pass_hist.record(
            duration.as_secs_f64() * 1_000.0,
            &[KeyValue::new("compile.pass", pass)],
        );
    }

    pub fn record_unresolved(reason: &'static str) {
        if !is_enabled() {
            return;
        }
        handles()
            .unresolved_counter
            .add(1, &[KeyValue::new("unresolved.reason", reason)]);
    }
}

#[cfg(not(feature = "telemetry"))]
mod otel {
    use std::time::Duration;

    pub fn enable() {}
    pub fn disable() {}
    pub fn is_enabled() -> bool {
        false
    }
    pub fn record_compile(
        _template: &str,
        _template_len: usize,
        _duration: Duration,
        _success: bool,
    ) {
    }
    pub fn record_pass(_pass: &'static str, _duration: Duration) {}
    pub fn record_unresolved(_reason: &'static str) {}
}

pub use otel::{disable, enable, is_enabled, record_compile, record_pass, record_unresolved};

/// Runs `pass` and reports its duration under `name`.
pub fn timed<T>(name: &'static str, pass: impl FnOnce() -> T) -> T {
    if !is_enabled() {
        return pass();
    }
    let started = std::time::Instant::now();
    let out = pass();
    record_pass(name, started.elapsed());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn recording_is_safe_in_any_state() {
        record_compile("t", 3, Duration::from_millis(1), true);
        record_unresolved("unknown_root");
        enable();
        record_compile("t", 3, Duration::from_millis(1), false);
        record_unresolved("unbalanced");
        assert_eq!(timed("scan", || 2 + 2), 4);
        disable();
        assert!(!is_enabled());
    }
}
