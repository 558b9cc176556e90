use rgn_scan_observer::{
    Annotations, OverrideState, QualifierEncodingScheme, QueryShape, RegionScanner, Scan,
    ScanError, ScannerHolder, WrapRequest, SCANNER_OPENED_TRACE_INFO
};
use rstest::rstest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use tracing::Span;
use utils::{
    read_rows, region_info, with_recorder, CountingFactory, FactoryMode, ProbeScanner, SpanEvent
};


mod utils;


const SPAN: &str = "scanner_opened";


fn new_holder(factory: Arc<CountingFactory>, rows: &[&'static str]) -> (ScannerHolder, Arc<AtomicUsize>) {
    let scan = Scan::new("a", "m");
    let (raw, closes) = ProbeScanner::open(rows, &scan);
    let request = WrapRequest {
        shape: QueryShape::NonAggregate,
        region: region_info("a", "m"),
        scan,
        encoding_scheme: QualifierEncodingScheme::NonEncoded,
        use_new_value_column_qualifier: false
    };
    let holder = ScannerHolder::new(
        QueryShape::NonAggregate.strategy(),
        factory,
        request,
        Annotations::default(),
        Arc::from(SCANNER_OPENED_TRACE_INFO),
        raw
    );
    (holder, closes)
}


fn current_span_name() -> Option<&'static str> {
    Span::current().metadata().map(|m| m.name())
}


#[test]
fn construction_is_deferred_until_first_fetch() {
    with_recorder(|recorder| {
        let factory = CountingFactory::new(FactoryMode::PassThrough);
        let (mut holder, closes) = new_holder(factory.clone(), &["a", "b", "c", "d"]);

        assert_eq!(holder.state(), OverrideState::Uninitialized);
        assert_eq!(factory.calls(), 0);
        assert_eq!(recorder.opened(SPAN), 0);

        let mut result = Vec::new();
        assert!(holder.next(&mut result).unwrap());
        assert!(holder.next_batch(&mut result, 2).unwrap());
        assert!(!holder.next_raw(&mut result).unwrap());
        assert!(!holder.next_raw_batch(&mut result, 5).unwrap());

        let rows: Vec<_> = result.iter().map(|cell| cell.row.as_ref()).collect();
        assert_eq!(rows, vec![&b"a"[..], b"b", b"c", b"d"]);

        assert_eq!(factory.calls(), 1);
        assert_eq!(holder.state(), OverrideState::Overridden);
        assert_eq!(recorder.opened(SPAN), 1);
        assert_eq!(recorder.closed(SPAN), 0);

        holder.close().unwrap();
        assert_eq!(recorder.closed(SPAN), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        holder.close().unwrap();
        assert_eq!(recorder.closed(SPAN), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    })
}


#[rstest]
fn factory_is_invoked_once(#[values(1, 2, 5, 20)] fetches: usize) {
    let factory = CountingFactory::new(FactoryMode::PassThrough);
    let (mut holder, _) = new_holder(factory.clone(), &["a", "b", "c"]);

    for _ in 0..fetches {
        holder.next(&mut Vec::new()).unwrap();
    }

    assert_eq!(factory.calls(), 1);
}


#[test]
fn child_span_is_current_only_during_construction() {
    with_recorder(|recorder| {
        let factory = CountingFactory::new(FactoryMode::PassThrough);
        let (mut holder, _) = new_holder(factory.clone(), &["a"]);

        let request_span = tracing::info_span!("request");
        let _entered = request_span.enter();

        holder.next(&mut Vec::new()).unwrap();

        assert_eq!(factory.span_during_wrap(), Some(SPAN));
        assert_eq!(current_span_name(), Some("request"));
        assert!(recorder.events().contains(&SpanEvent::Opened {
            name: SPAN,
            parent: Some("request")
        }));
    })
}


#[test]
fn failed_construction_stops_span_and_never_retries() {
    with_recorder(|recorder| {
        let factory = CountingFactory::new(FactoryMode::Fail);
        let (mut holder, closes) = new_holder(factory.clone(), &["a", "b"]);

        let request_span = tracing::info_span!("request");
        let _entered = request_span.enter();

        let err = holder.next(&mut Vec::new()).unwrap_err();

        assert_eq!(recorder.opened(SPAN), 1);
        assert_eq!(recorder.closed(SPAN), 1);
        assert_eq!(current_span_name(), Some("request"));

        let scan_error = err.downcast_ref::<ScanError>().unwrap();
        assert!(scan_error.is_fatal());
        assert!(scan_error.to_string().contains("failed to deserialize projector"));
        assert_eq!(holder.state(), OverrideState::Failed);

        let err = holder.next_raw(&mut Vec::new()).unwrap_err();
        let scan_error = err.downcast_ref::<ScanError>().unwrap();
        assert!(scan_error.is_fatal());
        assert!(scan_error.to_string().contains("previously failed"));
        assert_eq!(factory.calls(), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 0);

        holder.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.opened(SPAN), 1);
        assert_eq!(recorder.closed(SPAN), 1);

        holder.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    })
}


#[test]
fn raw_scanner_is_closed_from_another_thread_after_failed_construction() {
    let factory = CountingFactory::new(FactoryMode::Fail);
    let (mut holder, closes) = new_holder(factory, &["a"]);

    assert!(holder.next(&mut Vec::new()).is_err());

    let closer = holder.closer();
    std::thread::spawn(move || closer.close()).join().unwrap().unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);

    holder.close().unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}


#[test]
fn not_serving_during_construction_is_stale_boundary() {
    let factory = CountingFactory::new(FactoryMode::NotServing);
    let (mut holder, _) = new_holder(factory, &["a"]);

    let err = holder.next(&mut Vec::new()).unwrap_err();
    match err.downcast_ref::<ScanError>().unwrap() {
        ScanError::StaleBoundary { table } => assert_eq!(table.as_str(), utils::TABLE),
        other => panic!("unexpected error: {}", other)
    }
}


#[test]
fn close_from_another_thread() {
    with_recorder(|recorder| {
        let factory = CountingFactory::new(FactoryMode::PassThrough);
        let (mut holder, closes) = new_holder(factory, &["a", "b", "c"]);

        holder.next(&mut Vec::new()).unwrap();

        let closer = holder.closer();
        std::thread::spawn(move || closer.close()).join().unwrap().unwrap();

        assert_eq!(recorder.closed(SPAN), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let err = holder.next(&mut Vec::new()).unwrap_err();
        assert!(err.downcast_ref::<ScanError>().unwrap().is_fatal());

        holder.close().unwrap();
        assert_eq!(recorder.closed(SPAN), 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    })
}


#[test]
fn close_racing_with_fetches() {
    let rows: Vec<&'static str> = (0..200)
        .map(|i| &*Box::leak(format!("a{:04}", i).into_boxed_str()))
        .collect();

    for _ in 0..20 {
        with_recorder(|recorder| {
            let factory = CountingFactory::new(FactoryMode::PassThrough);
            let (mut holder, closes) = new_holder(factory.clone(), &rows);

            let barrier = Arc::new(Barrier::new(2));
            let closer = holder.closer();
            let closer_thread = {
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    closer.close()
                })
            };

            barrier.wait();
            let mut fetched = 0;
            while let Ok(true) = holder.next(&mut Vec::new()) {
                fetched += 1;
            }

            closer_thread.join().unwrap().unwrap();
            holder.close().unwrap();

            assert!(fetched <= rows.len());
            assert!(factory.calls() <= 1);
            assert_eq!(closes.load(Ordering::SeqCst), 1);
            assert_eq!(recorder.opened(SPAN), factory.calls());
            assert_eq!(recorder.closed(SPAN), recorder.opened(SPAN));
        })
    }
}


#[test]
fn closed_before_first_fetch() {
    with_recorder(|recorder| {
        let factory = CountingFactory::new(FactoryMode::PassThrough);
        let (mut holder, closes) = new_holder(factory.clone(), &["a"]);

        holder.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let err = holder.next(&mut Vec::new()).unwrap_err();
        assert!(err.downcast_ref::<ScanError>().unwrap().is_fatal());
        assert_eq!(factory.calls(), 0);
        assert_eq!(recorder.opened(SPAN), 0);
    })
}


#[test]
fn rows_flow_through_installed_scanner() {
    let factory = CountingFactory::new(FactoryMode::PassThrough);
    let (mut holder, _) = new_holder(factory.clone(), &["b", "c", "k", "z"]);

    let rows = read_rows(&mut holder).unwrap();
    assert_eq!(rows, vec!["b", "c", "k"]);

    let request = factory.last_request().unwrap();
    assert_eq!(request.shape, QueryShape::NonAggregate);
    assert_eq!(request.region.end_key().as_ref(), b"m");
}
