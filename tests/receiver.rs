mod common;

use num::complex::Complex32;

use dab::config::{CoarseCorrector, WindowPlacement};
use dab::consts::TransmissionMode;
use dab::ofdm::Demodulator;
use dab::source::{MemorySource, SampleBlock};
use dab::sync::SyncState;
use dab::{DabError, Pipeline, Receiver, ReceiverConfig, ReceiverEvent};

use common::*;

fn config(mode: TransmissionMode) -> ReceiverConfig {
    ReceiverConfig::default().with_mode(mode)
}

/// Feed the samples in blocks of the given size and collect every event.
fn run(recv: &mut Receiver, samples: &[Complex32], block: usize) -> Vec<ReceiverEvent> {
    samples.chunks(block).flat_map(|b| recv.feed(b)).collect()
}

/// Index of the first event reporting frame sync.
fn synced_at(events: &[ReceiverEvent]) -> Option<usize> {
    events.iter().position(|e| *e == ReceiverEvent::SyncChanged(SyncState::FrameSynced))
}

fn superframes(events: &[ReceiverEvent]) -> Vec<&dab::msc::superframe::Superframe> {
    events.iter()
        .filter_map(|e| match *e {
            ReceiverEvent::Superframe(ref sf) => Some(sf),
            _ => None,
        })
        .collect()
}

#[test]
fn test_sync_correctors() {
    let cases = [
        (TransmissionMode::II, 0.0),
        (TransmissionMode::II, 730.0),
        (TransmissionMode::II, -1000.0),
        (TransmissionMode::I, 1000.0),
        (TransmissionMode::I, -420.0),
    ];

    for &corrector in &[CoarseCorrector::GetMiddle, CoarseCorrector::CorrelatePrs,
                        CoarseCorrector::PatternOfZeros]
    {
        for &(mode, offset) in cases.iter() {
            let mut tx = Transmitter::new(mode).with_offset(offset).with_noise(0.02);
            let mut recv = Receiver::new(config(mode).with_coarse_corrector(corrector))
                .unwrap();

            let frames = 5;
            let samples = tx.frames(frames);
            let events = run(&mut recv, &samples, 10000);

            assert!(synced_at(&events).is_some(), "{:?} {:?} {}", corrector, mode, offset);
            assert_eq!(recv.sync_state(), SyncState::FrameSynced);

            let snap = recv.telemetry().snapshot();
            assert!((snap.offset_hz as f64 - offset).abs() < 50.0,
                    "{:?} {:?} {} estimated {}", corrector, mode, offset, snap.offset_hz);
            assert!(snap.snr > 10.0);
        }
    }
}

#[test]
fn test_window_placements() {
    for &placement in &[WindowPlacement::StrongestPeak,
                        WindowPlacement::EarliestPeakWithBinning,
                        WindowPlacement::ThresholdBeforePeak]
    {
        let mode = TransmissionMode::II;
        let mut tx = Transmitter::new(mode).with_offset(250.0).with_noise(0.02);
        let mut recv = Receiver::new(config(mode).with_window_placement(placement))
            .unwrap();

        let events = run(&mut recv, &tx.frames(6), 8192);

        assert!(synced_at(&events).is_some(), "{:?}", placement);
        // Decoded FIBs prove the symbols were demodulated in place.
        assert!(recv.telemetry().snapshot().fib_ok > 0, "{:?}", placement);
        assert_eq!(recv.telemetry().snapshot().fib_failed, 0, "{:?}", placement);
    }
}

#[test]
fn test_end_to_end() {
    let mode = TransmissionMode::II;
    let mut tx = Transmitter::new(mode).with_offset(-600.0).with_noise(0.03);
    let mut recv = Receiver::new(config(mode)).unwrap();
    recv.select_subchannel(Some(SUBCHANNEL));

    let samples = tx.frames(40);
    let events = run(&mut recv, &samples, 32768);

    let synced = synced_at(&events).unwrap();

    let ensemble = events.iter()
        .filter_map(|e| match *e {
            ReceiverEvent::EnsembleChanged(ref e) => Some(e.clone()),
            _ => None,
        })
        .last()
        .unwrap();

    assert_eq!(ensemble.id, Some(ENSEMBLE_ID));
    assert_eq!(ensemble.label.as_ref().unwrap().text, ENSEMBLE_LABEL);
    assert!(!ensemble.subchannels.is_empty());

    let sub = ensemble.audio_service(SERVICE_ID).unwrap();
    assert_eq!(sub.id, SUBCHANNEL);
    assert_eq!(sub.bitrate(), Some(48));
    assert_eq!(ensemble.service_for(SUBCHANNEL).unwrap().label.as_ref().unwrap().text,
               SERVICE_LABEL);

    let sfs = superframes(&events);
    assert!(!sfs.is_empty());

    // Superframes only follow sync.
    let first = events.iter()
        .position(|e| match *e {
            ReceiverEvent::Superframe(_) => true,
            _ => false,
        })
        .unwrap();
    assert!(first > synced);

    for sf in sfs.iter() {
        assert_eq!(sf.subchannel, SUBCHANNEL);
        assert_eq!(sf.uncorrectable, 0);
        assert_eq!(sf.units.len(), 3);
        assert!(sf.units.iter().all(|u| u.valid));
        assert!(tx.sent().iter().any(|s| *s == sf.data));
    }

    let snap = recv.telemetry().snapshot();
    assert_eq!(snap.sync, SyncState::FrameSynced);
    assert_eq!(snap.ensemble_id, Some(ENSEMBLE_ID));
    assert_eq!(snap.fib_failed, 0);
    assert!(snap.fib_ok > 0);
    assert_eq!(snap.rs_uncorrectable, 0);
    assert_eq!(snap.superframes, sfs.len() as u64);
}

#[test]
fn test_corrupt_fibs() {
    let mode = TransmissionMode::II;
    let mut tx = Transmitter::new(mode).with_noise(0.02);
    tx.corrupt_fibs = true;

    let mut recv = Receiver::new(config(mode)).unwrap();
    let events = run(&mut recv, &tx.frames(6), 16384);

    assert!(synced_at(&events).is_some());
    assert!(!events.iter().any(|e| match *e {
        ReceiverEvent::EnsembleChanged(_) => true,
        _ => false,
    }));

    let snap = recv.telemetry().snapshot();
    assert_eq!(snap.fib_ok, 0);
    assert!(snap.fib_failed > 0);
    assert_eq!(snap.ensemble_id, None);
    assert_eq!(recv.ensemble().id, None);
}

#[test]
fn test_retune() {
    let mode = TransmissionMode::II;
    let samples = Transmitter::new(mode).with_noise(0.02).frames(8);

    let mut once = Receiver::new(config(mode)).unwrap();
    once.select_subchannel(Some(SUBCHANNEL));
    once.reset();

    let mut twice = Receiver::new(config(mode)).unwrap();
    twice.select_subchannel(Some(SUBCHANNEL));
    // Leave some state behind before retuning.
    run(&mut twice, &samples[..samples.len() / 2], 10000);
    twice.reset();
    twice.reset();

    assert_eq!(run(&mut once, &samples, 10000), run(&mut twice, &samples, 10000));
    assert_eq!(once.telemetry().snapshot(), twice.telemetry().snapshot());
}

#[test]
fn test_noise_only() {
    let mode = TransmissionMode::II;
    let len = mode.params().frame_len();
    let mut recv = Receiver::new(config(mode).with_no_signal_timeout(4)).unwrap();
    recv.select_subchannel(Some(SUBCHANNEL));

    let events = run(&mut recv, &noise(len * 10, 0.5, 7), 8192);

    assert!(synced_at(&events).is_none());
    assert!(superframes(&events).is_empty());
    assert!(events.contains(&ReceiverEvent::NoSignal));
    assert!(!events.iter().any(|e| match *e {
        ReceiverEvent::SyncChanged(_) => true,
        _ => false,
    }));
    assert_eq!(recv.sync_state(), SyncState::Searching);
    assert_eq!(recv.telemetry().snapshot().sync, SyncState::Searching);
}

#[test]
fn test_lost() {
    let mode = TransmissionMode::II;
    let params = mode.params();
    let mut recv = Receiver::new(config(mode).with_lost_after(3)).unwrap();

    let mut samples = Transmitter::new(mode).with_noise(0.02).frames(4);
    samples.extend(noise(params.frame_len() * 6, 0.001, 3));

    let events = run(&mut recv, &samples, 10000);
    let synced = synced_at(&events).unwrap();
    let lost = events.iter()
        .position(|e| *e == ReceiverEvent::SyncChanged(SyncState::Lost))
        .unwrap();

    assert!(lost > synced);
    assert_ne!(recv.sync_state(), SyncState::FrameSynced);
}

#[test]
fn test_tii() {
    let mode = TransmissionMode::I;
    let mut tx = Transmitter::new(mode).with_tii(5, 11).with_noise(0.02);
    let mut recv = Receiver::new(config(mode).with_tii(true)).unwrap();

    let events = run(&mut recv, &tx.frames(4), 20000);

    let tii = events.iter()
        .filter_map(|e| match *e {
            ReceiverEvent::Tii(ref m) => Some(m.clone()),
            _ => None,
        })
        .last()
        .unwrap();

    assert_eq!((tii[0].main, tii[0].sub), (5, 11));
    assert_eq!(recv.telemetry().snapshot().tii[0].main, 5);
}

#[test]
fn test_symbol_order() {
    let params = TransmissionMode::II.params();
    let mut demod = Demodulator::new(TransmissionMode::II);
    let symbol = vec![Complex32::new(1.0, 0.0); params.symbol_len];
    let mut bits = vec![0; params.symbol_bits()];

    assert!(demod.feed(0, &symbol, &mut bits).is_ok());
    assert!(demod.feed(1, &symbol, &mut bits).is_ok());
    assert_eq!(demod.feed(3, &symbol, &mut bits),
               Err(DabError::SymbolOrder { expected: 2, got: 3 }));

    // The differential reference is gone until the next phase reference.
    assert_eq!(demod.feed(2, &symbol, &mut bits),
               Err(DabError::SymbolOrder { expected: 0, got: 2 }));
    assert!(demod.feed(0, &symbol, &mut bits).is_ok());
}

#[test]
fn test_run_source() {
    let mode = TransmissionMode::II;
    let samples = Transmitter::new(mode).with_noise(0.02).frames(4);
    let mut src = MemorySource::new(samples, 12345);
    let mut recv = Receiver::new(config(mode)).unwrap();
    let mut events = vec![];

    assert_eq!(recv.run(&mut src, |e| events.push(e)), DabError::EndOfStream);
    assert!(synced_at(&events).is_some());
    assert_eq!(events.last(), Some(&ReceiverEvent::SyncChanged(SyncState::Lost)));
}

#[test]
fn test_pipeline() {
    let mode = TransmissionMode::II;
    let mut tx = Transmitter::new(mode).with_noise(0.02);
    let samples = tx.frames(36);

    let mut p = Pipeline::spawn(config(mode).with_queue_depth(256)).unwrap();
    p.select_subchannel(Some(SUBCHANNEL)).unwrap();

    for block in samples.chunks(65536) {
        p.push(SampleBlock::new(block.to_vec())).unwrap();
    }

    p.finish();

    let events = p.events().try_iter().collect::<Vec<_>>();
    assert!(synced_at(&events).is_some());
    assert_eq!(p.telemetry().snapshot().dropped_blocks, 0);

    let sfs = superframes(&events);
    assert!(!sfs.is_empty());
    assert!(sfs.iter().all(|sf| sf.uncorrectable == 0));
}

#[test]
fn test_pipeline_reset() {
    let mode = TransmissionMode::II;
    let samples = Transmitter::new(mode).with_noise(0.02).frames(30);

    let mut p = Pipeline::spawn(config(mode).with_queue_depth(256)).unwrap();

    for block in samples.chunks(65536) {
        p.push(SampleBlock::new(block.to_vec())).unwrap();
    }

    // Nothing queued before the reset is decoded after it.
    p.reset().unwrap();
    p.finish();

    let snap = p.telemetry().snapshot();
    assert_eq!(snap.sync, SyncState::Searching);
    assert_eq!(snap.ensemble_id, None);
    assert_eq!(snap.fib_ok, 0);
    assert_eq!(snap.superframes, 0);
}

#[test]
fn test_pipeline_end() {
    let mode = TransmissionMode::II;
    let samples = Transmitter::new(mode).with_noise(0.02).frames(6);
    let mut src = MemorySource::new(samples, 65536);

    let mut p = Pipeline::spawn(config(mode).with_queue_depth(256)).unwrap();

    assert_eq!(p.pump(&mut src), DabError::EndOfStream);
    p.finish();

    let events = p.events().try_iter().collect::<Vec<_>>();
    let synced = synced_at(&events).unwrap();

    assert_eq!(events.last(), Some(&ReceiverEvent::SyncChanged(SyncState::Lost)));
    assert!(events.len() - 1 > synced);
    assert_eq!(p.telemetry().snapshot().sync, SyncState::Lost);
    assert_eq!(p.telemetry().snapshot().dropped_blocks, 0);
}
