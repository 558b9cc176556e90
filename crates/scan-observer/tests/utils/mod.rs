#![allow(dead_code)]
use anyhow::bail;
use parking_lot::Mutex;
use rgn_scan_observer::error::NotServingRegion;
use rgn_scan_observer::{
    Cell, MemScanner, RegionInfo, RegionScanner, Scan, ScannerFactory, StaticRegion, TableName,
    WrapRequest
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::span::{Attributes, Id};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;


pub const TABLE: &str = "ORDERS";


pub fn region_info(start: &'static str, end: &'static str) -> RegionInfo {
    RegionInfo::new(TableName::new(TABLE), start, end, 1_700_000_000_000)
}


pub fn region(start: &'static str, end: &'static str) -> StaticRegion {
    StaticRegion::new(region_info(start, end))
}


pub fn cells(rows: &[&'static str]) -> Vec<Cell> {
    rows.iter()
        .map(|row| Cell::new(*row, "0", "v", 1, format!("value-{}", row)))
        .collect()
}


pub fn read_rows(scanner: &mut dyn RegionScanner) -> anyhow::Result<Vec<String>> {
    let mut rows = Vec::new();
    loop {
        let mut result = Vec::new();
        let has_more = scanner.next(&mut result)?;
        rows.extend(result.iter().map(|cell| String::from_utf8_lossy(&cell.row).into_owned()));
        if !has_more {
            return Ok(rows)
        }
    }
}


/// Raw scanner that counts how many times it was closed.
pub struct ProbeScanner {
    inner: MemScanner,
    closes: Arc<AtomicUsize>
}


impl ProbeScanner {
    pub fn open(rows: &[&'static str], scan: &Scan) -> (Box<dyn RegionScanner>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let scanner = Self {
            inner: MemScanner::open(cells(rows), scan),
            closes: closes.clone()
        };
        (Box::new(scanner), closes)
    }
}


impl RegionScanner for ProbeScanner {
    fn next(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        self.inner.next(result)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }
}


#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FactoryMode {
    PassThrough,
    Fail,
    NotServing
}


pub struct CountingFactory {
    mode: FactoryMode,
    calls: AtomicUsize,
    last_request: Mutex<Option<WrapRequest>>,
    span_during_wrap: Mutex<Option<&'static str>>
}


impl CountingFactory {
    pub fn new(mode: FactoryMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            span_during_wrap: Mutex::new(None)
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<WrapRequest> {
        self.last_request.lock().clone()
    }

    pub fn span_during_wrap(&self) -> Option<&'static str> {
        *self.span_during_wrap.lock()
    }
}


impl ScannerFactory for CountingFactory {
    fn wrap(
        &self,
        request: &WrapRequest,
        scanner: Box<dyn RegionScanner>
    ) -> anyhow::Result<Box<dyn RegionScanner>>
    {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request.clone());
        *self.span_during_wrap.lock() = tracing::Span::current().metadata().map(|m| m.name());
        match self.mode {
            FactoryMode::PassThrough => Ok(scanner),
            FactoryMode::Fail => bail!("failed to deserialize projector"),
            FactoryMode::NotServing => bail!(NotServingRegion {
                region: request.region.region_name()
            })
        }
    }
}


#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SpanEvent {
    Opened {
        name: &'static str,
        parent: Option<&'static str>
    },
    Closed(&'static str)
}


/// Collects span open/close events.
#[derive(Clone, Default)]
pub struct SpanRecorder {
    events: Arc<Mutex<Vec<SpanEvent>>>
}


impl SpanRecorder {
    pub fn events(&self) -> Vec<SpanEvent> {
        self.events.lock().clone()
    }

    pub fn opened(&self, name: &str) -> usize {
        self.events().iter()
            .filter(|e| matches!(e, SpanEvent::Opened { name: n, .. } if *n == name))
            .count()
    }

    pub fn closed(&self, name: &str) -> usize {
        self.events().iter()
            .filter(|e| matches!(e, SpanEvent::Closed(n) if *n == name))
            .count()
    }
}


impl<S> Layer<S> for SpanRecorder
where
    S: Subscriber + for<'a> LookupSpan<'a>
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let parent = ctx.span(id)
            .and_then(|span| span.parent())
            .map(|parent| parent.name());
        self.events.lock().push(SpanEvent::Opened {
            name: attrs.metadata().name(),
            parent
        });
    }

    fn on_close(&self, id: Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(&id) {
            self.events.lock().push(SpanEvent::Closed(span.name()));
        }
    }
}


pub fn with_recorder<R>(f: impl FnOnce(&SpanRecorder) -> R) -> R {
    use tracing_subscriber::layer::SubscriberExt;

    let recorder = SpanRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    tracing::subscriber::with_default(subscriber, || f(&recorder))
}
