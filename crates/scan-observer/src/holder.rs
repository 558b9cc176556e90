use crate::attrs::Annotations;
use crate::error::{normalize, ScannerClosed, ScannerFailed};
use crate::scan::Cell;
use crate::scanner::RegionScanner;
use crate::strategy::{ScanStrategy, ScannerFactory, WrapRequest};
use anyhow::anyhow;
use parking_lot::Mutex;
use scopeguard::ScopeGuard;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{info_span, Span};


#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum OverrideState {
    Uninitialized = 0,
    Overridden = 1,
    /// Construction of the result scanner failed, it is never attempted again
    Failed = 2
}


struct OverrideCell(AtomicU8);


impl OverrideCell {
    fn new() -> Self {
        Self(AtomicU8::new(OverrideState::Uninitialized as u8))
    }

    fn get(&self) -> OverrideState {
        match self.0.load(Ordering::Acquire) {
            0 => OverrideState::Uninitialized,
            1 => OverrideState::Overridden,
            _ => OverrideState::Failed
        }
    }

    /// The single `Uninitialized -> Overridden` transition.
    /// Only the caller that wins it may invoke the scanner factory.
    fn claim(&self) -> bool {
        self.0.compare_exchange(
            OverrideState::Uninitialized as u8,
            OverrideState::Overridden as u8,
            Ordering::AcqRel,
            Ordering::Acquire
        ).is_ok()
    }

    fn fail(&self) {
        self.0.store(OverrideState::Failed as u8, Ordering::Release)
    }
}


/// The "scanner opened" span. Stopped at most once, from whichever thread gets there first.
struct ScanSpan {
    span: Mutex<Option<Span>>
}


impl ScanSpan {
    fn new(span: Span) -> Self {
        Self {
            span: Mutex::new(Some(span))
        }
    }

    fn in_scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let span = self.span.lock().clone().unwrap_or_else(Span::none);
        span.in_scope(f)
    }

    fn stop(&self) -> bool {
        let span = self.span.lock().take();
        span.is_some()
    }
}


/// Installed delegate: closing it also stops the span.
struct SpanClosingScanner {
    inner: Box<dyn RegionScanner>,
    span: Arc<ScanSpan>
}


impl RegionScanner for SpanClosingScanner {
    fn next(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        self.inner.next(result)
    }

    fn next_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        self.inner.next_batch(result, max_rows)
    }

    fn next_raw(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        self.inner.next_raw(result)
    }

    fn next_raw_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        self.inner.next_raw_batch(result, max_rows)
    }

    fn close(&mut self) -> anyhow::Result<()> {
        let _stop = scopeguard::guard(&self.span, |span| {
            span.stop();
        });
        self.inner.close()
    }
}


/// Raw scanner as handed to the factory.
///
/// The holder keeps a second handle, so the raw scanner can still be closed
/// when the factory fails after taking it. Closing takes the scanner out, it is closed at most once.
#[derive(Clone)]
struct SharedScanner {
    inner: Arc<Mutex<Option<Box<dyn RegionScanner>>>>
}


impl SharedScanner {
    fn new(scanner: Box<dyn RegionScanner>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(scanner)))
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut dyn RegionScanner) -> anyhow::Result<R>) -> anyhow::Result<R> {
        let mut inner = self.inner.lock();
        let scanner = inner.as_mut().ok_or(ScannerClosed)?;
        f(&mut **scanner)
    }
}


impl RegionScanner for SharedScanner {
    fn next(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        self.with(|scanner| scanner.next(result))
    }

    fn next_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        self.with(|scanner| scanner.next_batch(result, max_rows))
    }

    fn next_raw(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        self.with(|scanner| scanner.next_raw(result))
    }

    fn next_raw_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        self.with(|scanner| scanner.next_raw_batch(result, max_rows))
    }

    fn close(&mut self) -> anyhow::Result<()> {
        let scanner = self.inner.lock().take();
        match scanner {
            Some(mut scanner) => scanner.close(),
            None => Ok(())
        }
    }
}


struct Shared {
    state: OverrideCell,
    span: OnceLock<Arc<ScanSpan>>,
    /// `None` once closed. After a failed construction holds the raw scanner until close.
    delegate: Mutex<Option<Box<dyn RegionScanner>>>
}


impl Shared {
    fn close(&self) -> anyhow::Result<()> {
        let delegate = self.delegate.lock().take();
        let _stop = scopeguard::guard((), |_| {
            if let Some(span) = self.span.get() {
                span.stop();
            }
        });
        match delegate {
            Some(mut scanner) => scanner.close(),
            None => Ok(())
        }
    }
}


/// Wraps the raw region scanner and builds the real result scanner on the first fetch.
///
/// All fetch methods go through the same override check, the factory runs at most once.
/// Closing is allowed from any thread via [HolderCloser],
/// it waits for an in-flight fetch to finish.
pub struct ScannerHolder {
    shared: Arc<Shared>,
    strategy: &'static dyn ScanStrategy,
    factory: Arc<dyn ScannerFactory>,
    request: WrapRequest,
    annotations: Annotations,
    span_description: Arc<str>
}


impl ScannerHolder {
    pub fn new(
        strategy: &'static dyn ScanStrategy,
        factory: Arc<dyn ScannerFactory>,
        request: WrapRequest,
        annotations: Annotations,
        span_description: Arc<str>,
        scanner: Box<dyn RegionScanner>
    ) -> Self
    {
        Self {
            shared: Arc::new(Shared {
                state: OverrideCell::new(),
                span: OnceLock::new(),
                delegate: Mutex::new(Some(scanner))
            }),
            strategy,
            factory,
            request,
            annotations,
            span_description
        }
    }

    pub fn state(&self) -> OverrideState {
        self.shared.state.get()
    }

    pub fn request(&self) -> &WrapRequest {
        &self.request
    }

    pub fn closer(&self) -> HolderCloser {
        HolderCloser {
            shared: self.shared.clone()
        }
    }

    fn fetch<F>(&mut self, op: F) -> anyhow::Result<bool>
    where
        F: FnOnce(&mut dyn RegionScanner) -> anyhow::Result<bool>
    {
        let mut delegate = self.shared.delegate.lock();

        if self.shared.state.get() == OverrideState::Failed {
            return Err(self.fatal(anyhow!(ScannerFailed)))
        }

        let Some(scanner) = delegate.take() else {
            return Err(self.fatal(anyhow!(ScannerClosed)))
        };

        let scanner = if self.shared.state.claim() {
            let raw = SharedScanner::new(scanner);
            match self.override_delegate(Box::new(raw.clone())) {
                Ok(scanner) => scanner,
                Err(err) => {
                    // left for close(), unless the factory already closed it
                    *delegate = Some(Box::new(raw));
                    return Err(err)
                }
            }
        } else {
            scanner
        };

        let scanner = delegate.insert(scanner);
        op(&mut **scanner)
    }

    fn override_delegate(&self, raw: Box<dyn RegionScanner>) -> anyhow::Result<Box<dyn RegionScanner>> {
        let saved = Span::current();
        let child = info_span!(
            parent: &saved,
            "scanner_opened",
            description = %self.span_description,
            shape = %self.request.shape,
            region = %self.request.region.region_name()
        );

        let span = Arc::new(ScanSpan::new(child));
        let span = self.shared.span.get_or_init(|| span).clone();

        let stop_on_failure = scopeguard::guard(span, |span| {
            span.stop();
        });

        // the child is only current for the duration of the factory call,
        // leaving the scope puts `saved` back on this thread
        let result = stop_on_failure.in_scope(|| {
            self.strategy.create_scanner(&self.request, raw, self.factory.as_ref())
        });

        match result {
            Ok(scanner) => {
                let span = ScopeGuard::into_inner(stop_on_failure);
                Ok(Box::new(SpanClosingScanner {
                    inner: scanner,
                    span
                }))
            },
            Err(err) => {
                drop(stop_on_failure);
                self.shared.state.fail();
                Err(self.fatal(err))
            }
        }
    }

    fn fatal(&self, err: anyhow::Error) -> anyhow::Error {
        let region = &self.request.region;
        anyhow::Error::new(normalize(
            region.table(),
            &region.region_name(),
            &self.annotations,
            err
        ))
    }
}


impl RegionScanner for ScannerHolder {
    fn next(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        self.fetch(|scanner| scanner.next(result))
    }

    fn next_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        self.fetch(|scanner| scanner.next_batch(result, max_rows))
    }

    fn next_raw(&mut self, result: &mut Vec<Cell>) -> anyhow::Result<bool> {
        self.fetch(|scanner| scanner.next_raw(result))
    }

    fn next_raw_batch(&mut self, result: &mut Vec<Cell>, max_rows: usize) -> anyhow::Result<bool> {
        self.fetch(|scanner| scanner.next_raw_batch(result, max_rows))
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.shared.close()
    }
}


/// Cross-thread close handle of a [ScannerHolder].
#[derive(Clone)]
pub struct HolderCloser {
    shared: Arc<Shared>
}


impl HolderCloser {
    pub fn close(&self) -> anyhow::Result<()> {
        self.shared.close()
    }
}
