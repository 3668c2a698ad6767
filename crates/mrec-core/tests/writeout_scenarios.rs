use mrec_core::{
    CandidateQueues, CandidateWriter, MatchedWriteOutTool, OverflowPolicy, SharedVars,
    StoreRegistry, WriteOutConfig,
};
use mrec_error::RecoError;
use mrec_recon::{MuonReconstructor, ReconPolicy, ScriptedStrategies, echoed_geometry};
use mrec_store::{
    ChannelMasking, EventCursor, JsonlOutputStore, MemoryEventStore, MemoryOutputStore,
    OutputRow,
};
use mrec_types::{
    Candidate, EntryPoint, EventCategory, EventHeader, EventRecord, Hit, HitWindow, HwTimestamp,
    LowEPayload, MaskingMode, MatchedPartner, ReadStatus, Vec3,
};

const STORE_ENTRIES: u32 = 8;
const PRIOR_MASKING: MaskingMode = MaskingMode::from_code(26);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Entry `n` holds event `500 + n` with inner channels `10n..10n+3` and one
/// outer hit on channel `n`.
fn event_store() -> MemoryEventStore {
    let records = (0..STORE_ENTRIES)
        .map(|n| {
            let base = i32::try_from(n).expect("entry fits i32") * 10;
            let inner = (0..3)
                .map(|k| Hit::new(base + k, 1.5 + k as f32, 900.0 + k as f32))
                .collect();
            let outer = vec![Hit::new(base / 10, 0.5, 950.0)];
            EventRecord {
                header: EventHeader {
                    run: 85_000,
                    subrun: 3,
                    event_number: 500 + n,
                    gate_offset: 0,
                },
                hits: HitWindow::from_hits(inner, outer).expect("hits fit default capacity"),
                ..EventRecord::default()
            }
        })
        .collect();
    let mut store = MemoryEventStore::new(records);
    store.set_masking_mode(PRIOR_MASKING);
    store
}

fn writer(script: ScriptedStrategies) -> CandidateWriter {
    CandidateWriter::new(
        MuonReconstructor::new(script.build(), ReconPolicy::default()),
        OverflowPolicy::Truncate,
        true,
    )
}

fn entry(x: f32, time: f32) -> EntryPoint {
    EntryPoint::new(Vec3::new(x, -200.0, 1810.0), time)
}

fn inner_channels(row: &OutputRow) -> Vec<i32> {
    row.hits.inner.hits().iter().map(|hit| hit.channel).collect()
}

#[test]
fn muon_with_two_tracks_appends_two_rows() {
    init_tracing();
    let tracks = [entry(100.0, 1001.0), entry(-300.0, 1004.0)];
    let script = ScriptedStrategies::new()
        .with_selector_quality(1)
        .with_multi_track(3, 0.75, tracks);
    let mut store = event_store();
    store.seek(6).expect("seek to start position");
    let mut queue = vec![Candidate::muon(2)];
    let mut output = MemoryOutputStore::new("mu_writer");

    let report = writer(script)
        .write_out(&mut store, &mut queue, &mut output, EventCategory::Muon, false)
        .expect("write-out succeeds");

    assert_eq!(report.rows_appended, 2);
    assert_eq!(output.rows().len(), 2);
    for (index, row) in output.rows().iter().enumerate() {
        let muon = row.muon().expect("muon row");
        assert!(!muon.fallback_used, "track={index}");
        assert_eq!(muon.track_index, index);
        assert_eq!(muon.own_track_entry(), Some(&tracks[index]));
        assert_eq!(echoed_geometry(&muon.dedx_binned).entry, tracks[index]);
        assert_eq!(row.header.event_number, 502);
    }
    assert_eq!(store.position(), 6);
    assert!(queue.is_empty());
}

#[test]
fn lowe_with_disjoint_following_window_concatenates() {
    init_tracing();
    let mut store = event_store();
    let mut queue = vec![Candidate::low_energy(3, LowEPayload::default()).with_following_window()];
    let mut output = MemoryOutputStore::new("relic_writer");

    let report = writer(ScriptedStrategies::new())
        .write_out(
            &mut store,
            &mut queue,
            &mut output,
            EventCategory::LowEnergy,
            false,
        )
        .expect("write-out succeeds");

    assert_eq!(output.rows().len(), 1);
    let row = &output.rows()[0];
    assert_eq!(row.hits.inner.len(), 3 + 3);
    assert_eq!(row.hits.outer.len(), 1 + 1);
    assert_eq!(inner_channels(row), vec![30, 31, 32, 40, 41, 42]);
    assert_eq!(report.following_windows_merged, 1);
    assert_eq!(report.overlap_hits_skipped, 0);
    assert_eq!(store.position(), 0);
}

#[test]
fn overlapping_following_window_skips_duplicates() {
    let mut records: Vec<EventRecord> = (0..3).map(|_| EventRecord::default()).collect();
    records[1].hits = HitWindow::from_hits(
        vec![Hit::new(1, 1.0, 10.0), Hit::new(2, 2.0, 20.0)],
        Vec::new(),
    )
    .expect("hits fit");
    records[2].hits = HitWindow::from_hits(
        vec![
            Hit::new(1, 1.0, -990.0),
            Hit::new(2, 2.0, -980.0),
            Hit::new(3, 3.0, -970.0),
        ],
        Vec::new(),
    )
    .expect("hits fit");
    let mut store = MemoryEventStore::new(records);
    let mut queue = vec![Candidate::low_energy(1, LowEPayload::default()).with_following_window()];
    let mut output = MemoryOutputStore::new("relic_writer");

    let report = writer(ScriptedStrategies::new())
        .write_out(
            &mut store,
            &mut queue,
            &mut output,
            EventCategory::LowEnergy,
            false,
        )
        .expect("write-out succeeds");

    assert_eq!(inner_channels(&output.rows()[0]), vec![1, 2, 3]);
    assert_eq!(report.overlap_hits_skipped, 2);
}

#[test]
fn match_metadata_is_stamped_and_payload_copied() {
    let payload = LowEPayload {
        vertex: [120.0, -40.0, 300.0, 1000.0],
        energy: 17.5,
        n50: 61,
        ..LowEPayload::default()
    };
    let mut candidate = Candidate::low_energy(4, payload.clone()).with_partner(MatchedPartner {
        event_number: 498,
        entry_number: 2,
        has_following_window: true,
        time_diff: -3.2e6,
        energy: 0.0,
    });
    candidate.timestamp = HwTimestamp {
        clock_ticks: 0x1_0000_0042,
        rollovers: 7,
    };
    let mut store = event_store();
    let mut queue = vec![candidate, Candidate::low_energy(5, LowEPayload::default())];
    let mut output = MemoryOutputStore::new("relic_writer");

    writer(ScriptedStrategies::new())
        .write_out(
            &mut store,
            &mut queue,
            &mut output,
            EventCategory::LowEnergy,
            false,
        )
        .expect("write-out succeeds");

    let stamped = &output.rows()[0];
    assert_eq!(stamped.matches.matched_event_numbers, vec![498]);
    assert_eq!(stamped.matches.matched_time_diffs, vec![-3.2e6]);
    assert_eq!(stamped.matches.hw_clock_ticks, 0x1_0000_0042);
    assert_eq!(stamped.matches.hw_rollovers, 7);
    assert_eq!(
        stamped.payload,
        mrec_store::RowPayload::LowEnergy(payload),
        "payload copied through unchanged"
    );

    let partnerless = &output.rows()[1];
    assert_eq!(partnerless.matches.partner_count(), 0);
    assert_eq!(partnerless.matches.hw_clock_ticks, 0);
}

#[test]
fn lookahead_failure_aborts_whole_call() {
    init_tracing();
    let mut store = event_store();
    store.seek(7).expect("seek to start position");
    store.fail_entry(5);
    let mut queue = vec![
        Candidate::muon(1),
        Candidate::muon(4).with_following_window(),
        Candidate::muon(6),
    ];
    let mut output = MemoryOutputStore::new("mu_writer");

    let err = writer(ScriptedStrategies::new())
        .write_out(&mut store, &mut queue, &mut output, EventCategory::Muon, false)
        .expect_err("lookahead read fails");

    assert!(matches!(err, RecoError::Read { entry: 5, .. }), "{err}");
    assert_eq!(output.rows().len(), 1, "only the first candidate was written");
    assert!(queue.is_empty());
    assert_eq!(store.position(), 7);
    assert_eq!(store.masking_mode(), PRIOR_MASKING);
}

#[test]
fn failed_muon_gated_reload_restores_masking_and_cursor() {
    let mut store = event_store();
    store.seek(2).expect("seek to start position");
    store.set_gate_status(3, ReadStatus::EndOfFile);
    let mut queue = vec![Candidate::muon(3).with_sub_trigger(1, 1200)];
    let mut output = MemoryOutputStore::new("mu_writer");

    let err = writer(ScriptedStrategies::new())
        .write_out(&mut store, &mut queue, &mut output, EventCategory::Muon, false)
        .expect_err("gated reload fails");

    assert!(matches!(
        err,
        RecoError::SubTriggerReload {
            entry: 3,
            status: 2
        }
    ));
    assert_eq!(store.masking_mode(), PRIOR_MASKING);
    assert_eq!(store.position(), 2);
    assert!(output.rows().is_empty());
}

#[test]
fn muon_candidates_are_reconstructed_with_bad_channels_masked() {
    let mut store = event_store().with_bad_channels([21]);
    store.set_masking_mode(PRIOR_MASKING);
    let mut queue = vec![Candidate::muon(2)];
    let mut output = MemoryOutputStore::new("mu_writer");

    writer(ScriptedStrategies::new())
        .write_out(&mut store, &mut queue, &mut output, EventCategory::Muon, false)
        .expect("write-out succeeds");

    assert_eq!(inner_channels(&output.rows()[0]), vec![20, 22]);
    assert_eq!(store.masking_mode(), PRIOR_MASKING);
}

#[test]
fn tool_cycle_writes_jsonl_outputs() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let relic_path = dir.path().join("relic.jsonl");
    let muon_path = dir.path().join("muon.jsonl");

    let config = WriteOutConfig::from_toml_str(
        r#"
        reader_name = "skroot_reader"
        muon_writer_name = "mu"
        relic_writer_name = "relic"
        "#,
    )
    .expect("config parses");
    let mut registry = StoreRegistry::new();
    registry
        .register_reader("skroot_reader", event_store())
        .expect("register reader");
    registry
        .register_writer(Box::new(
            JsonlOutputStore::create("relic", &relic_path).expect("create relic output"),
        ))
        .expect("register relic");
    registry
        .register_writer(Box::new(
            JsonlOutputStore::create("mu", &muon_path).expect("create muon output"),
        ))
        .expect("register muon");

    let script = ScriptedStrategies::new()
        .with_multi_track(1, 0.2, [entry(0.0, 1000.0)])
        .with_precision_goodness(0.45);
    let mut tool = MatchedWriteOutTool::initialise(config, registry, script.build())
        .expect("tool initialises");
    let vars = SharedVars {
        try_precision_fit: true,
    };

    let mut queues = CandidateQueues {
        relics: vec![Candidate::low_energy(1, LowEPayload::default())],
        muons: vec![Candidate::muon(2), Candidate::muon(5)],
    };
    let cycle = tool
        .execute(&mut queues, &vars)
        .expect("cycle succeeds");
    assert_eq!(cycle.rows_appended(), 3);
    assert!(queues.is_empty());

    queues.relics.push(Candidate::low_energy(6, LowEPayload::default()));
    let last = tool
        .finalise(&mut queues, &vars)
        .expect("finalise succeeds");
    assert!(last.muon.is_none());

    let mut registry = tool.into_registry();
    let reader = registry.reader("skroot_reader").expect("reader registered");
    assert_eq!(reader.position(), 0);
    assert_eq!(registry.rows_written("relic").expect("relic registered"), 2);
    assert_eq!(registry.rows_written("mu").expect("muon registered"), 2);

    let rows: Vec<OutputRow> = std::fs::read_to_string(&muon_path)
        .expect("read muon output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("row parses"))
        .collect();
    assert_eq!(rows.len(), 2);
    let muon = rows[0].muon().expect("muon payload");
    assert!(muon.precision.applied);
    assert_eq!(rows[1].header.event_number, 505);
}
