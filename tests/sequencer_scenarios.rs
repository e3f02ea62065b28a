use genseq_dsp::algorithm::AlgorithmRegistry;
use genseq_dsp::bus::{DoubleBuffer, MasterToExpander};
use genseq_dsp::quantizer::SCALES;
use genseq_dsp::sequencer::{Controls, CycleInputs, CycleOutputs, Direction, SequencerCore};
use genseq_dsp::session::Session;

const DT: f32 = 0.01;

fn running_core(algorithm: &str, seed: u64) -> SequencerCore {
    let registry = AlgorithmRegistry::with_builtins();
    let mut core = SequencerCore::new(&registry, algorithm).unwrap();
    core.reset(seed);
    core.set_running(true);
    core
}

/// Drive on the internal clock, collecting one output per processing cycle.
fn drive_free(core: &mut SequencerCore, controls: Controls, cycles: usize) -> Vec<CycleOutputs> {
    (0..cycles)
        .map(|_| {
            core.process(&CycleInputs {
                dt: DT,
                controls,
                ..Default::default()
            })
        })
        .collect()
}

/// Drive with an external clock at a fixed period, collecting one output
/// per processing cycle.
fn drive_clocked(
    core: &mut SequencerCore,
    controls: Controls,
    edges: usize,
    cycles_per_edge: usize,
) -> Vec<CycleOutputs> {
    let mut outs = Vec::new();
    for _ in 0..edges {
        for cycle in 0..cycles_per_edge {
            let inputs = CycleInputs {
                dt: DT,
                clock_edge: cycle == 0,
                external_clock_connected: true,
                controls,
                ..Default::default()
            };
            outs.push(core.process(&inputs));
        }
    }
    outs
}

#[test]
fn two_cores_with_one_seed_agree_for_two_hundred_steps() {
    let controls = Controls {
        steps: 16,
        density: 0.8,
        ..Default::default()
    };
    for algorithm in ["walk", "acid", "sting", "euclid-accent", "hypnotic-evolve"] {
        let mut a = running_core(algorithm, 0x5EED_CAFE);
        let mut b = running_core(algorithm, 0x5EED_CAFE);
        let outs_a = drive_clocked(&mut a, controls, 200, 10);
        let outs_b = drive_clocked(&mut b, controls, 200, 10);
        assert_eq!(outs_a, outs_b, "{algorithm}");
    }
}

#[test]
fn restart_after_twenty_steps_replays_the_same_twenty() {
    let controls = Controls {
        steps: 8,
        density: 0.9,
        ..Default::default()
    };
    let mut core = running_core("sting", 42);
    // 1000 cycles at 2 Hz and 10 ms per cycle covers 20 step advances.
    let first = drive_free(&mut core, controls, 1000);
    let seed_before = core.seed();
    core.restart();
    let second = drive_free(&mut core, controls, 1000);
    assert_eq!(core.seed(), seed_before);
    assert_eq!(first, second);
}

#[test]
fn reseed_diverges_then_restart_replays_the_new_seed() {
    let controls = Controls::default();
    let mut core = running_core("walk", 1);
    let original = drive_free(&mut core, controls, 1500);

    let reseed = CycleInputs {
        dt: DT,
        reseed_trigger: true,
        controls,
        ..Default::default()
    };
    core.process(&reseed);
    assert_ne!(core.seed(), 1);

    // Realign to step 0 so both captures start from the same phase.
    core.restart();
    let fresh = drive_free(&mut core, controls, 1500);
    assert_ne!(original, fresh);

    core.restart();
    let replay = drive_free(&mut core, controls, 1500);
    assert_eq!(fresh, replay);
}

#[test]
fn ping_pong_over_four_steps_bounces_without_repeating_interior() {
    let controls = Controls {
        steps: 4,
        direction: Direction::PingPong,
        density: 1.0,
        ..Default::default()
    };
    let mut core = running_core("euclid", 9);
    let mut visited = Vec::new();
    for _ in 0..10 {
        drive_clocked(&mut core, controls, 1, 10);
        visited.push(core.current_step());
    }
    assert_eq!(visited, vec![0, 1, 2, 3, 2, 1, 0, 1, 2, 3]);
}

#[test]
fn half_speed_division_fires_once_per_two_edges() {
    // Rate knob -2 below a 2 Hz pivot divides the incoming clock by 2.
    let controls = Controls {
        steps: 8,
        rate_knob: -2.0,
        density: 1.0,
        ..Default::default()
    };
    let mut core = running_core("walk", 3);
    let outs = drive_clocked(&mut core, controls, 8, 10);
    let per_edge: Vec<u32> = outs
        .chunks(10)
        .map(|chunk| chunk.iter().map(|o| o.steps_advanced).sum())
        .collect();
    assert_eq!(per_edge, vec![1, 0, 1, 0, 1, 0, 1, 0]);
}

#[test]
fn multiplication_inserts_subdivided_steps_between_edges() {
    // Knob +1 requests 4 Hz against the 2 Hz pivot: two steps per edge.
    let controls = Controls {
        steps: 8,
        rate_knob: 1.0,
        density: 1.0,
        ..Default::default()
    };
    let mut core = running_core("walk", 3);
    // Settle the period estimate over a few edges first.
    drive_clocked(&mut core, controls, 4, 10);
    let outs = drive_clocked(&mut core, controls, 6, 10);
    let per_edge: Vec<u32> = outs
        .chunks(10)
        .map(|chunk| chunk.iter().map(|o| o.steps_advanced).sum())
        .collect();
    assert!(per_edge.iter().all(|&n| n == 2), "{per_edge:?}");
}

#[test]
fn scale_change_revoices_a_sustained_note() {
    let controls = Controls {
        steps: 8,
        density: 1.0,
        gate_percent: 1.0,
        scale_index: 0,
        ..Default::default()
    };
    let mut core = running_core("euclid", 21);

    // Fire edges until a gated step lands off the root, so some scale is
    // guaranteed to exclude its degree.
    let mut held = None;
    for _ in 0..64 {
        for _ in 0..9 {
            core.process(&CycleInputs {
                dt: DT,
                external_clock_connected: true,
                controls,
                ..Default::default()
            });
        }
        let out = core.process(&CycleInputs {
            dt: DT,
            clock_edge: true,
            external_clock_connected: true,
            controls,
            ..Default::default()
        });
        let degree = ((out.pitch * 12.0).round() as i32).rem_euclid(12) as u8;
        if out.gate && degree != 0 {
            held = Some((out.pitch, degree));
            break;
        }
    }
    let (held_pitch, degree) = held.expect("a gated non-root step within 64 edges");

    // Flip to a scale that disallows the held degree mid-sustain; the
    // output must move without waiting for the next step.
    let target = SCALES
        .iter()
        .position(|s| !s.intervals.contains(&degree))
        .expect("a scale excluding the held degree");
    let shifted = Controls {
        scale_index: target,
        ..controls
    };
    let out = core.process(&CycleInputs {
        dt: DT,
        external_clock_connected: true,
        controls: shifted,
        ..Default::default()
    });
    assert!(out.gate);
    assert!(out.new_note);
    assert_ne!(out.pitch, held_pitch);
}

#[test]
fn transpose_change_revoices_a_sustained_note() {
    let controls = Controls {
        steps: 4,
        density: 1.0,
        gate_percent: 1.0,
        scale_index: 0,
        ..Default::default()
    };
    let mut core = running_core("hypnotic", 7);

    // Fire edges until a step lands with its gate open.
    let mut held = None;
    for _ in 0..50 {
        for _ in 0..9 {
            core.process(&CycleInputs {
                dt: DT,
                external_clock_connected: true,
                controls,
                ..Default::default()
            });
        }
        let out = core.process(&CycleInputs {
            dt: DT,
            clock_edge: true,
            external_clock_connected: true,
            controls,
            ..Default::default()
        });
        if out.gate {
            held = Some(out.pitch);
            break;
        }
    }
    let held = held.expect("a gated step within 50 edges");

    // Shift transpose off the old semitone lattice mid-sustain; the output
    // must move without waiting for the next step.
    let shifted = Controls {
        transpose: 0.1,
        ..controls
    };
    let out = core.process(&CycleInputs {
        dt: DT,
        external_clock_connected: true,
        controls: shifted,
        ..Default::default()
    });
    assert!(out.gate);
    assert!(out.new_note);
    assert_ne!(out.pitch, held);
}

#[test]
fn bus_snapshot_survives_publish_and_decode() {
    let controls = Controls {
        steps: 8,
        density: 1.0,
        ..Default::default()
    };
    let mut core = running_core("euclid", 11);
    drive_clocked(&mut core, controls, 12, 10);

    let mut bus: DoubleBuffer<MasterToExpander> = DoubleBuffer::new();
    core.populate_master_message(bus.producer_mut());
    bus.publish();

    let shared = bus.consumer();
    assert!(shared.is_valid());
    assert!(shared.running);
    assert_eq!(shared.steps, 8);
    assert!(shared.current_step >= 1 && shared.current_step <= 8);
    assert!(shared.history.iter().any(|slot| slot.valid));

    let mut wire = [0u8; MasterToExpander::WIRE_SIZE];
    shared.encode(&mut wire);
    let decoded = MasterToExpander::decode(&wire).expect("valid frame");
    assert_eq!(&decoded, shared);
}

#[test]
fn session_restores_identical_playback() {
    let registry = AlgorithmRegistry::with_builtins();
    let controls = Controls {
        steps: 16,
        direction: Direction::Reverse,
        ..Default::default()
    };
    let mut original = running_core("acid", 0xD1CE);
    original.set_controls(controls);
    let session = Session::capture(&original, &registry);

    let mut restored = SequencerCore::new(&registry, "walk").unwrap();
    session.apply(&mut restored, &registry);

    original.restart();
    let a = drive_free(&mut original, controls, 2000);
    let b = drive_free(&mut restored, controls, 2000);
    assert_eq!(a, b);
}
