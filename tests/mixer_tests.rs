//! Mixer Tests
//!
//! Tests for:
//! - Weighted blending: single action, equal weights, partial weight, additive
//! - Order independence of accumulation (all permutations)
//! - Loop policies: repeat, ping-pong, once, repetitions, clamping
//! - Scheduling: delayed start, fades, cross-fades, warps
//! - Lifecycle: play/stop idempotence, shared binding reference counts,
//!   uncaching and pool statistics
//! - Events and change detection

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use glam::Quat;

use myth_animation::animation::binder::Binder;
use myth_animation::animation::property_mixer::{PropertyMixer, Sample};
use myth_animation::animation::{
    ActionHandle, ActionState, AnimationClip, AnimationMixer, BlendMode, Ending, Endings, InterpolationMode,
    Interpolant, KeyframeTrack, LoopMode, MixerEvent, MixerStats, ValueType,
};
use myth_animation::resources::Material;
use myth_animation::scene::{NodeHandle, Property, Scene};

const EPSILON: f32 = 1e-5;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// Rig
/// └── Target (value = 10, material.opacity = 1, label = "idle", smile/frown)
struct Rig {
    scene: Scene,
    root: NodeHandle,
    target: NodeHandle,
}

const ORIGINAL: f32 = 10.0;

fn rig() -> Rig {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut scene = Scene::new();
    let root = scene.create_node_with_name("Rig");
    let target = scene.create_child(root, "Target");

    let node = scene.get_node_mut(target).unwrap();
    node.set_property("value", Property::Scalar(ORIGINAL));
    node.set_property("label", Property::Text("idle".into()));
    node.set_morph_targets(["smile", "frown"]);
    node.material = Some(Material::new("skin").with_property("opacity", Property::Scalar(1.0)));

    Rig { scene, root, target }
}

impl Rig {
    fn value(&self) -> f32 {
        match self.scene.get_node(self.target).unwrap().property("value") {
            Some(Property::Scalar(v)) => *v,
            other => panic!("unexpected property {other:?}"),
        }
    }
}

fn value_clip(name: &str, times: Vec<f32>, values: Vec<f32>) -> Arc<AnimationClip> {
    Arc::new(AnimationClip::new(name, vec![KeyframeTrack::number("Target.value", times, values).unwrap()]).unwrap())
}

/// Linear 0 → `end` over one second.
fn ramp_clip(name: &str, end: f32) -> Arc<AnimationClip> {
    value_clip(name, vec![0.0, 1.0], vec![0.0, end])
}

fn start(mixer: &mut AnimationMixer, rig: &Rig, clip: &Arc<AnimationClip>) -> ActionHandle {
    let handle = mixer.clip_action(&rig.scene, clip, None, None).unwrap();
    mixer.play(handle, &rig.scene);
    handle
}

// ============================================================================
// Blending
// ============================================================================

#[test]
fn single_action_samples_clip() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    start(&mut mixer, &rig, &ramp_clip("a", 1.0));

    mixer.update(0.5, &mut rig.scene);
    assert!(approx(rig.value(), 0.5), "Expected 0.5, got {}", rig.value());
}

#[test]
fn equal_weights_average() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    start(&mut mixer, &rig, &ramp_clip("b", 2.0));

    mixer.update(0.5, &mut rig.scene);
    assert!(approx(rig.value(), 0.75), "Expected 0.75, got {}", rig.value());
}

#[test]
fn partial_weight_mixes_original() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let a = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.action_mut(a).unwrap().weight = 0.5;

    mixer.update(0.5, &mut rig.scene);
    // 0.5 * 0.5 + 10 * 0.5
    assert!(approx(rig.value(), 5.25), "Expected 5.25, got {}", rig.value());
}

#[test]
fn full_weight_hides_original() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let a = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    let b = start(&mut mixer, &rig, &ramp_clip("b", 2.0));
    mixer.action_mut(a).unwrap().weight = 0.25;
    mixer.action_mut(b).unwrap().weight = 0.75;

    mixer.update(0.5, &mut rig.scene);
    // 0.25 * 0.5 + 0.75 * 1.0, no trace of the original value
    assert!(approx(rig.value(), 0.875), "Expected 0.875, got {}", rig.value());
}

#[test]
fn zero_weight_leaves_original() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let a = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.action_mut(a).unwrap().set_effective_weight(0.0);

    mixer.update(0.5, &mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL));
}

#[test]
fn play_order_does_not_matter() {
    let clips = [ramp_clip("a", 1.0), ramp_clip("b", 3.0), ramp_clip("c", -2.0)];
    let weights = [0.2, 0.5, 0.9];

    let run = |order: [usize; 3]| {
        let mut rig = rig();
        let mut mixer = AnimationMixer::new(rig.root);
        for i in order {
            let handle = start(&mut mixer, &rig, &clips[i]);
            mixer.action_mut(handle).unwrap().weight = weights[i];
        }
        mixer.update(0.4, &mut rig.scene);
        rig.value()
    };

    let reference = run([0, 1, 2]);
    for order in [[0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]] {
        let value = run(order);
        assert!((value - reference).abs() < 1e-6, "{order:?}: {value} vs {reference}");
    }
}

/// Heap's algorithm.
fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut items: Vec<usize> = (0..n).collect();
    let mut counters = vec![0; n];
    let mut out = vec![items.clone()];

    let mut i = 1;
    while i < n {
        if counters[i] < i {
            if i % 2 == 0 {
                items.swap(0, i);
            } else {
                items.swap(counters[i], i);
            }
            out.push(items.clone());
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
    out
}

#[test]
fn accumulation_is_order_independent() {
    let rig = rig();
    let track = KeyframeTrack::vector("Target.value", vec![0.0], vec![0.0, 0.0]).unwrap();
    let binding = Binder::bind(&rig.scene, rig.root, &track);

    let samples: [[f32; 2]; 5] = [[0.1, 0.9], [0.9, -0.3], [0.4, 0.4], [0.25, 0.0], [0.7, 0.55]];
    let weights: [f32; 5] = [0.2, 0.5, 1.0, 0.3, 0.8];

    let total: f64 = weights.iter().map(|&w| f64::from(w)).sum();
    let expected: Vec<f64> = (0..2)
        .map(|k| {
            samples
                .iter()
                .zip(&weights)
                .map(|(s, &w)| f64::from(s[k]) * f64::from(w))
                .sum::<f64>()
                / total
        })
        .collect();

    let orders = permutations(samples.len());
    assert_eq!(orders.len(), 120);

    for order in orders {
        let mut mixer = PropertyMixer::new(binding.clone(), ValueType::Vector, 2);
        for &i in &order {
            mixer.accumulate(0, Sample::Numeric(&samples[i]), weights[i]);
        }
        let result = mixer.accumulated(0);
        for k in 0..2 {
            let diff = (f64::from(result[k]) - expected[k]).abs();
            assert!(diff < 1e-6, "order {order:?}, component {k}: off by {diff}");
        }
        assert!((f64::from(mixer.cumulative_weight()) - total).abs() < 1e-6);
    }
}

#[test]
fn quaternions_blend_on_the_arc() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);

    let quat_clip = |name: &str, q: Quat| {
        let values = [q.to_array(), q.to_array()].concat();
        Arc::new(
            AnimationClip::new(
                name,
                vec![KeyframeTrack::quaternion("Target.quaternion", vec![0.0, 1.0], values).unwrap()],
            )
            .unwrap(),
        )
    };
    start(&mut mixer, &rig, &quat_clip("rest", Quat::IDENTITY));
    start(&mut mixer, &rig, &quat_clip("turn", Quat::from_rotation_y(FRAC_PI_2)));

    mixer.update(0.5, &mut rig.scene);

    let q = rig.scene.get_node(rig.target).unwrap().rotation();
    assert!(approx(q.length(), 1.0), "blend must stay normalized, got {q:?}");
    assert!(q.dot(Quat::from_rotation_y(FRAC_PI_2 / 2.0)).abs() > 0.9999, "got {q:?}");
}

// ============================================================================
// Additive Blending
// ============================================================================

#[test]
fn additive_adds_on_top_of_normal_pose() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);

    start(&mut mixer, &rig, &value_clip("base", vec![0.0, 1.0], vec![1.0, 1.0]));
    let additive_clip = Arc::new(
        AnimationClip::new(
            "layer",
            vec![KeyframeTrack::number("Target.value", vec![0.0, 1.0], vec![0.0, 2.0]).unwrap()],
        )
        .unwrap()
        .with_blend_mode(BlendMode::Additive),
    );
    let layer = start(&mut mixer, &rig, &additive_clip);
    assert_eq!(mixer.action(layer).unwrap().blend_mode(), BlendMode::Additive);

    mixer.update(0.5, &mut rig.scene);
    assert!(approx(rig.value(), 2.0), "Expected 2.0, got {}", rig.value());

    mixer.action_mut(layer).unwrap().weight = 0.5;
    mixer.update(0.0, &mut rig.scene);
    assert!(approx(rig.value(), 1.5), "Expected 1.5, got {}", rig.value());
}

#[test]
fn additive_alone_adds_to_original() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);

    let clip = value_clip("layer", vec![0.0, 1.0], vec![0.0, 2.0]);
    let layer = mixer.clip_action(&rig.scene, &clip, None, Some(BlendMode::Additive)).unwrap();
    mixer.play(layer, &rig.scene);

    mixer.update(0.5, &mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL + 1.0), "got {}", rig.value());
}

// ============================================================================
// Loop Policies
// ============================================================================

#[test]
fn repeat_wraps_by_duration() {
    let clip = value_clip("wave", vec![0.0, 0.5, 1.0], vec![0.0, 3.0, 1.0]);
    let t = 0.3;
    let expected = clip.tracks()[0].sample(t)[0];

    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    start(&mut mixer, &rig, &clip);

    for k in 0..4 {
        mixer.set_time(t + k as f32 * clip.duration(), &mut rig.scene);
        assert!((rig.value() - expected).abs() < 1e-4, "k={k}: {} vs {expected}", rig.value());
    }
}

#[test]
fn ping_pong_is_symmetric() {
    let clip = value_clip("swing", vec![0.0, 0.4, 1.0], vec![0.0, 2.0, 1.0]);

    let value_at = |time: f32| {
        let mut rig = rig();
        let mut mixer = AnimationMixer::new(rig.root);
        let handle = mixer.clip_action(&rig.scene, &clip, None, None).unwrap();
        mixer.action_mut(handle).unwrap().set_loop(LoopMode::PingPong, None);
        mixer.play(handle, &rig.scene);
        mixer.update(time, &mut rig.scene);
        rig.value()
    };

    let duration = clip.duration();
    for t in [0.1, 0.3, 0.45, 0.8] {
        let forward = value_at(t);
        let backward = value_at(2.0 * duration - t);
        assert!((forward - backward).abs() < 1e-4, "t={t}: {forward} vs {backward}");
    }
}

#[test]
fn once_finishes_and_reports_once() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = mixer.clip_action(&rig.scene, &ramp_clip("a", 1.0), None, None).unwrap();
    mixer.action_mut(handle).unwrap().set_loop(LoopMode::Once, None);
    mixer.play(handle, &rig.scene);

    mixer.update(0.6, &mut rig.scene);
    assert!(mixer.drain_events().is_empty());
    assert_eq!(mixer.action(handle).unwrap().state(), ActionState::Running);

    mixer.update(0.6, &mut rig.scene);
    assert_eq!(
        mixer.drain_events(),
        vec![MixerEvent::Finished {
            action: handle,
            direction: 1
        }]
    );
    assert_eq!(mixer.action(handle).unwrap().state(), ActionState::Finished);
    // not clamped: the action drops out and the original value returns
    assert!(approx(rig.value(), ORIGINAL));

    mixer.update(0.6, &mut rig.scene);
    assert!(mixer.drain_events().is_empty());
}

#[test]
fn clamp_when_finished_holds_last_frame() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = mixer.clip_action(&rig.scene, &ramp_clip("a", 4.0), None, None).unwrap();
    {
        let action = mixer.action_mut(handle).unwrap();
        action.set_loop(LoopMode::Once, None);
        action.clamp_when_finished = true;
    }
    mixer.play(handle, &rig.scene);

    mixer.update(1.5, &mut rig.scene);
    assert!(approx(rig.value(), 4.0), "Expected 4.0, got {}", rig.value());

    let action = mixer.action(handle).unwrap();
    assert!(action.paused);
    assert!(approx(action.time, 1.0));

    mixer.update(1.0, &mut rig.scene);
    assert!(approx(rig.value(), 4.0));
}

#[test]
fn repetitions_emit_loops_then_finish() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = mixer.clip_action(&rig.scene, &ramp_clip("a", 1.0), None, None).unwrap();
    mixer.action_mut(handle).unwrap().set_loop(LoopMode::Repeat, Some(2));
    mixer.play(handle, &rig.scene);

    for _ in 0..4 {
        mixer.update(0.6, &mut rig.scene);
    }

    assert_eq!(
        mixer.drain_events(),
        vec![
            MixerEvent::Loop {
                action: handle,
                loop_delta: 1
            },
            MixerEvent::Finished {
                action: handle,
                direction: 1
            },
        ]
    );
    assert_eq!(mixer.action(handle).unwrap().loop_count(), 2);
}

fn clamped_ping_pong(rig: &Rig, mixer: &mut AnimationMixer, repetitions: u32) -> ActionHandle {
    let handle = mixer.clip_action(&rig.scene, &ramp_clip("swing", 1.0), None, None).unwrap();
    {
        let action = mixer.action_mut(handle).unwrap();
        action.set_loop(LoopMode::PingPong, Some(repetitions));
        action.clamp_when_finished = true;
    }
    mixer.play(handle, &rig.scene);
    handle
}

#[test]
fn clamped_ping_pong_holds_end_of_forward_round() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = clamped_ping_pong(&rig, &mut mixer, 1);

    for expected in [0.3, 0.6, 0.9] {
        mixer.update(0.3, &mut rig.scene);
        assert!(approx(rig.value(), expected), "Expected {expected}, got {}", rig.value());
    }

    mixer.update(0.3, &mut rig.scene);
    let events = mixer.drain_events();
    assert!(matches!(events.as_slice(), [MixerEvent::Finished { direction: 1, .. }]));
    assert!(approx(rig.value(), 1.0), "Expected 1.0, got {}", rig.value());

    mixer.update(0.3, &mut rig.scene);
    assert!(approx(rig.value(), 1.0), "held frame moved to {}", rig.value());
    assert_eq!(mixer.action(handle).unwrap().state(), ActionState::Finished);
}

#[test]
fn clamped_ping_pong_holds_end_of_backward_round() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    clamped_ping_pong(&rig, &mut mixer, 2);

    for expected in [0.4, 0.8, 0.8, 0.4] {
        mixer.update(0.4, &mut rig.scene);
        assert!(approx(rig.value(), expected), "Expected {expected}, got {}", rig.value());
    }

    mixer.update(0.4, &mut rig.scene);
    let events = mixer.drain_events();
    assert!(matches!(events.last(), Some(MixerEvent::Finished { direction: 1, .. })));
    assert!(approx(rig.value(), 0.0), "Expected 0.0, got {}", rig.value());

    mixer.update(0.4, &mut rig.scene);
    assert!(approx(rig.value(), 0.0), "held frame moved to {}", rig.value());
}

#[test]
fn zero_duration_clip_holds_first_frame() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let clip = value_clip("pose", vec![0.0], vec![4.0]);
    assert_eq!(clip.duration(), 0.0);
    let handle = start(&mut mixer, &rig, &clip);

    // endless repeat: nothing to report
    for _ in 0..3 {
        mixer.update(1.0, &mut rig.scene);
        assert!(approx(rig.value(), 4.0));
    }
    assert!(mixer.drain_events().is_empty());
    assert!(approx(mixer.action(handle).unwrap().time, 0.0));
}

#[test]
fn zero_duration_once_finishes_on_first_step() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = mixer.clip_action(&rig.scene, &value_clip("pose", vec![0.0], vec![4.0]), None, None).unwrap();
    {
        let action = mixer.action_mut(handle).unwrap();
        action.set_loop(LoopMode::Once, None);
        action.clamp_when_finished = true;
    }
    mixer.play(handle, &rig.scene);

    for _ in 0..3 {
        mixer.update(0.5, &mut rig.scene);
        assert!(approx(rig.value(), 4.0));
    }

    assert_eq!(
        mixer.drain_events(),
        vec![MixerEvent::Finished {
            action: handle,
            direction: 1
        }]
    );
    assert_eq!(mixer.action(handle).unwrap().state(), ActionState::Finished);
}

#[test]
fn zero_duration_with_repetitions_finishes() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = mixer.clip_action(&rig.scene, &value_clip("pose", vec![0.0], vec![4.0]), None, None).unwrap();
    mixer.action_mut(handle).unwrap().set_loop(LoopMode::Repeat, Some(3));
    mixer.play(handle, &rig.scene);

    mixer.update(0.5, &mut rig.scene);
    mixer.update(0.5, &mut rig.scene);

    assert_eq!(mixer.drain_events().len(), 1);
    // not clamped: the original value returns
    assert!(approx(rig.value(), ORIGINAL));
}

#[test]
fn zero_slope_flags_pick_smooth_endings() {
    let track = KeyframeTrack::new(
        "Target.value",
        ValueType::Number,
        vec![0.0, 0.5, 1.0],
        vec![0.0, 1.0, 0.0],
        InterpolationMode::Smooth,
    )
    .unwrap();
    let clip = Arc::new(AnimationClip::new("bump", vec![track.clone()]).unwrap());

    let value_with = |zero_slope: bool| {
        let mut rig = rig();
        let mut mixer = AnimationMixer::new(rig.root);
        let handle = mixer.clip_action(&rig.scene, &clip, None, None).unwrap();
        {
            let action = mixer.action_mut(handle).unwrap();
            action.set_loop(LoopMode::Once, None);
            action.zero_slope_at_start = zero_slope;
            action.zero_slope_at_end = zero_slope;
        }
        mixer.play(handle, &rig.scene);
        mixer.update(0.1, &mut rig.scene);
        rig.value()
    };

    let expected = |ending: Ending| {
        let mut interpolant = Interpolant::new(&track);
        interpolant.endings = Endings { start: ending, end: ending };
        interpolant.evaluate(&track, 0.1)[0]
    };

    let flat = value_with(true);
    let natural = value_with(false);
    assert!(approx(flat, expected(Ending::ZeroSlope)), "got {flat}");
    assert!(approx(natural, expected(Ending::ZeroCurvature)), "got {natural}");
    assert!((flat - natural).abs() > 1e-3);
}

// ============================================================================
// Scheduling
// ============================================================================

#[test]
fn start_at_delays_playback() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = mixer.clip_action(&rig.scene, &ramp_clip("a", 1.0), None, None).unwrap();
    mixer.action_mut(handle).unwrap().start_at(0.5);
    mixer.play(handle, &rig.scene);
    assert_eq!(mixer.action(handle).unwrap().state(), ActionState::Scheduled);

    mixer.update(0.25, &mut rig.scene);
    assert!(approx(mixer.action(handle).unwrap().time, 0.0));

    mixer.update(0.5, &mut rig.scene);
    // started at mixer time 0.5, now at 0.75
    assert!(approx(rig.value(), 0.25), "Expected 0.25, got {}", rig.value());
    assert_eq!(mixer.action(handle).unwrap().state(), ActionState::Running);
}

#[test]
fn mixer_time_scale_speeds_up_everything() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.time_scale = 2.0;

    mixer.update(0.25, &mut rig.scene);
    assert!(approx(mixer.time, 0.5));
    assert!(approx(rig.value(), 0.5));
}

#[test]
fn paused_action_holds_pose() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));

    mixer.update(0.3, &mut rig.scene);
    mixer.action_mut(handle).unwrap().paused = true;
    mixer.update(0.3, &mut rig.scene);

    assert!(approx(rig.value(), 0.3));
    assert_eq!(mixer.action(handle).unwrap().state(), ActionState::Paused);
}

#[test]
fn set_time_seeks_absolutely() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    start(&mut mixer, &rig, &ramp_clip("a", 1.0));

    mixer.set_time(0.7, &mut rig.scene);
    assert!(approx(rig.value(), 0.7));
    assert!(approx(mixer.time, 0.7));

    mixer.set_time(0.2, &mut rig.scene);
    assert!(approx(rig.value(), 0.2));
}

#[test]
fn fade_in_ramps_weight() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = mixer
        .clip_action(&rig.scene, &value_clip("zero", vec![0.0, 1.0], vec![0.0, 0.0]), None, None)
        .unwrap();
    // scheduled before play
    mixer.action_mut(handle).unwrap().fade_in(1.0);
    mixer.play(handle, &rig.scene);

    mixer.update(0.5, &mut rig.scene);
    assert!(approx(mixer.action(handle).unwrap().effective_weight(), 0.5));
    assert!(approx(rig.value(), ORIGINAL * 0.5));

    mixer.update(0.6, &mut rig.scene);
    assert!(approx(mixer.action(handle).unwrap().effective_weight(), 1.0));
    assert!(approx(rig.value(), 0.0));
}

#[test]
fn fade_out_disables_action() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.action_mut(handle).unwrap().fade_out(0.2);

    mixer.update(0.3, &mut rig.scene);

    let action = mixer.action(handle).unwrap();
    assert!(!action.enabled);
    assert_eq!(action.effective_weight(), 0.0);
    assert!(approx(rig.value(), ORIGINAL));
}

#[test]
fn cross_fade_halfway_is_even_blend() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let a = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    let b = start(&mut mixer, &rig, &ramp_clip("b", 2.0));

    mixer.cross_fade(a, b, 0.2, false);
    mixer.update(0.1, &mut rig.scene);

    assert!(approx(mixer.action(a).unwrap().effective_weight(), 0.5));
    assert!(approx(mixer.action(b).unwrap().effective_weight(), 0.5));
    // a samples 0.1, b samples 0.2
    assert!(approx(rig.value(), 0.15), "Expected 0.15, got {}", rig.value());

    mixer.update(0.2, &mut rig.scene);
    assert!(!mixer.action(a).unwrap().enabled);
    assert!(approx(mixer.action(b).unwrap().effective_weight(), 1.0));
}

#[test]
fn cross_fade_with_warp_matches_speeds() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let short = start(&mut mixer, &rig, &ramp_clip("short", 1.0));
    let long = start(&mut mixer, &rig, &value_clip("long", vec![0.0, 2.0], vec![0.0, 1.0]));

    mixer.cross_fade(short, long, 0.5, true);
    mixer.update(0.25, &mut rig.scene);

    // short: 1 -> 0.5, long: 2 -> 1, both halfway
    assert!(approx(mixer.action(short).unwrap().effective_time_scale(), 0.75));
    assert!(approx(mixer.action(long).unwrap().effective_time_scale(), 1.5));
}

#[test]
fn halt_decelerates_then_pauses() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.action_mut(handle).unwrap().halt(0.5);

    mixer.update(0.25, &mut rig.scene);
    // time scale was 0.5 for this step
    assert!(approx(mixer.action(handle).unwrap().time, 0.125));

    mixer.update(0.5, &mut rig.scene);
    let action = mixer.action(handle).unwrap();
    assert!(action.paused);
    assert!(approx(action.time, 0.125));
}

#[test]
fn warp_ramps_time_scale_then_keeps_end_speed() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &value_clip("slow", vec![0.0, 4.0], vec![0.0, 4.0]));
    mixer.action_mut(handle).unwrap().warp(1.0, 3.0, 1.0);

    mixer.update(0.5, &mut rig.scene);
    let action = mixer.action(handle).unwrap();
    assert!(approx(action.effective_time_scale(), 2.0));
    assert!(approx(action.time, 1.0));

    mixer.update(0.6, &mut rig.scene);
    let action = mixer.action(handle).unwrap();
    assert!(approx(action.time_scale, 3.0));
    assert!(approx(action.time, 2.8));
    assert!(approx(rig.value(), 2.8));
}

#[test]
fn stop_warping_restores_plain_speed() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.action_mut(handle).unwrap().halt(0.5).stop_warping();

    mixer.update(0.25, &mut rig.scene);
    let action = mixer.action(handle).unwrap();
    assert!(approx(action.time, 0.25));
    assert!(!action.paused);
}

#[test]
fn stop_fading_keeps_action_enabled() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.action_mut(handle).unwrap().fade_out(0.2).stop_fading();

    mixer.update(0.3, &mut rig.scene);
    let action = mixer.action(handle).unwrap();
    assert!(action.enabled);
    assert!(approx(action.effective_weight(), 1.0));
    assert!(approx(rig.value(), 0.3));
}

#[test]
fn set_effective_time_scale_cancels_warp() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    {
        let action = mixer.action_mut(handle).unwrap();
        action.warp(1.0, 0.0, 1.0);
        action.set_effective_time_scale(2.0);
        assert!(approx(action.effective_time_scale(), 2.0));
    }

    mixer.update(0.25, &mut rig.scene);
    assert!(approx(mixer.action(handle).unwrap().time, 0.5));
    assert!(approx(rig.value(), 0.5));
}

#[test]
fn set_duration_stretches_one_round() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.action_mut(handle).unwrap().set_duration(2.0);
    assert!(approx(mixer.action(handle).unwrap().time_scale, 0.5));

    mixer.update(0.5, &mut rig.scene);
    assert!(approx(rig.value(), 0.25), "Expected 0.25, got {}", rig.value());
}

#[test]
fn sync_with_copies_time_and_speed() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let leader = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.action_mut(leader).unwrap().time_scale = 2.0;
    mixer.update(0.2, &mut rig.scene);

    let follower = start(&mut mixer, &rig, &ramp_clip("b", 1.0));
    let snapshot = mixer.action(leader).unwrap().clone();
    mixer.action_mut(follower).unwrap().sync_with(&snapshot);

    let action = mixer.action(follower).unwrap();
    assert!(approx(action.time, 0.4));
    assert!(approx(action.time_scale, 2.0));

    mixer.update(0.1, &mut rig.scene);
    let (leader, follower) = (mixer.action(leader).unwrap(), mixer.action(follower).unwrap());
    assert!(approx(leader.time, follower.time));
    assert!(approx(follower.time, 0.6));
}

#[test]
fn cross_fade_between_same_action_is_ignored() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let a = start(&mut mixer, &rig, &ramp_clip("a", 1.0));

    mixer.cross_fade(a, a, 0.2, false);
    mixer.update(0.3, &mut rig.scene);

    let action = mixer.action(a).unwrap();
    assert!(action.enabled);
    assert!(approx(action.effective_weight(), 1.0));
}

// ============================================================================
// Lifecycle & Reference Counting
// ============================================================================

#[test]
fn clip_action_is_cached() {
    let rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let clip = ramp_clip("a", 1.0);

    assert!(mixer.existing_action(&clip, None, None).is_none());
    let first = mixer.clip_action(&rig.scene, &clip, None, None).unwrap();
    let again = mixer.clip_action(&rig.scene, &clip, None, None).unwrap();
    assert_eq!(first, again);
    assert_eq!(mixer.existing_action(&clip, None, None), Some(first));

    let additive = mixer.clip_action(&rig.scene, &clip, None, Some(BlendMode::Additive)).unwrap();
    let on_target = mixer.clip_action(&rig.scene, &clip, Some(rig.target), None).unwrap();
    assert_ne!(first, additive);
    assert_ne!(first, on_target);

    let stats = mixer.stats();
    assert_eq!(stats.actions.total, 3);
    assert_eq!(stats.actions.in_use, 0);
    // the first two share ("Rig", "Target.value"); the third binds on another root
    assert_eq!(stats.bindings.total, 2);
    assert_eq!(mixer.binding(first, 0).unwrap().reference_count(), 2);
}

#[test]
fn stop_restores_original_and_is_idempotent() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.update(0.5, &mut rig.scene);
    assert_eq!(mixer.stats().actions.in_use, 1);
    assert_eq!(mixer.stats().bindings.in_use, 1);

    mixer.stop(handle, &mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL));
    let stats = mixer.stats();
    let action = mixer.action(handle).unwrap();
    assert_eq!(action.state(), ActionState::Inactive);
    assert_eq!(action.time, 0.0);

    mixer.stop(handle, &mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL));
    assert_eq!(mixer.stats(), stats);
    assert_eq!(stats.actions.in_use, 0);
    assert_eq!(stats.bindings.in_use, 0);
}

#[test]
fn play_twice_counts_once() {
    let rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    mixer.play(handle, &rig.scene);

    assert_eq!(mixer.binding(handle, 0).unwrap().use_count(), 1);
    assert_eq!(mixer.stats().actions.in_use, 1);
}

#[test]
fn shared_binding_survives_partial_stop() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let a = start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    let b = start(&mut mixer, &rig, &ramp_clip("b", 2.0));

    let shared = mixer.binding(a, 0).unwrap();
    assert_eq!(shared.reference_count(), 2);
    assert_eq!(shared.use_count(), 2);
    assert_eq!(mixer.stats().bindings.total, 1);

    mixer.update(0.25, &mut rig.scene);
    mixer.stop(a, &mut rig.scene);
    assert_eq!(mixer.binding(b, 0).unwrap().use_count(), 1);
    assert_eq!(mixer.stats().bindings.in_use, 1);

    // b alone now drives the property
    mixer.update(0.25, &mut rig.scene);
    assert!(approx(rig.value(), 1.0), "Expected 1.0, got {}", rig.value());

    mixer.stop(b, &mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL));
    assert_eq!(mixer.stats().bindings.in_use, 0);
}

#[test]
fn stop_all_restores_everything() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    let morph = Arc::new(
        AnimationClip::new(
            "smile",
            vec![KeyframeTrack::number("Target.morphTargetInfluences[smile]", vec![0.0, 1.0], vec![0.0, 1.0]).unwrap()],
        )
        .unwrap(),
    );
    start(&mut mixer, &rig, &morph);

    mixer.update(0.5, &mut rig.scene);
    assert_eq!(rig.scene.get_node(rig.target).unwrap().morph_target_influences, vec![0.5, 0.0]);

    mixer.stop_all_action(&mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL));
    assert_eq!(rig.scene.get_node(rig.target).unwrap().morph_target_influences, vec![0.0, 0.0]);
    assert_eq!(mixer.stats().actions.in_use, 0);
    assert_eq!(mixer.stats().bindings.in_use, 0);
}

#[test]
fn uncache_clip_drops_unreferenced_bindings() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let clip_a = ramp_clip("a", 1.0);
    let clip_b = ramp_clip("b", 2.0);
    let a = start(&mut mixer, &rig, &clip_a);
    let b = start(&mut mixer, &rig, &clip_b);
    mixer.update(0.5, &mut rig.scene);

    mixer.uncache_clip(&clip_a, &mut rig.scene);
    assert!(mixer.action(a).is_none());
    assert_eq!(mixer.stats().actions.total, 1);
    assert_eq!(mixer.stats().bindings.total, 1);
    assert_eq!(mixer.binding(b, 0).unwrap().reference_count(), 1);

    mixer.uncache_action(&clip_b, None, &mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL));
    assert_eq!(mixer.stats(), MixerStats::default());

    // stale handles are ignored
    mixer.play(a, &rig.scene);
    mixer.stop(b, &mut rig.scene);
    mixer.update(0.1, &mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL));
}

#[test]
fn uncache_root_releases_everything_on_it() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    start(&mut mixer, &rig, &ramp_clip("a", 1.0));
    start(&mut mixer, &rig, &ramp_clip("b", 2.0));
    mixer.update(0.5, &mut rig.scene);

    mixer.uncache_root(rig.root, &mut rig.scene);
    assert!(approx(rig.value(), ORIGINAL));
    assert_eq!(mixer.stats(), MixerStats::default());
    assert_eq!(mixer.actions().count(), 0);
}

// ============================================================================
// Targets, Events & Change Detection
// ============================================================================

#[test]
fn unresolved_track_still_plays() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let ghost = Arc::new(
        AnimationClip::new(
            "ghost",
            vec![KeyframeTrack::number("Nobody.value", vec![0.0, 1.0], vec![0.0, 1.0]).unwrap()],
        )
        .unwrap(),
    );
    let handle = mixer.clip_action(&rig.scene, &ghost, None, None).unwrap();
    assert!(!mixer.binding(handle, 0).unwrap().binding().is_resolved());
    mixer.action_mut(handle).unwrap().set_loop(LoopMode::Once, None);
    mixer.play(handle, &rig.scene);

    mixer.update(2.0, &mut rig.scene);
    assert_eq!(mixer.drain_events().len(), 1);
    assert!(approx(rig.value(), ORIGINAL));
}

#[test]
fn discrete_targets_follow_keys() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let clip = Arc::new(
        AnimationClip::new(
            "blink",
            vec![
                KeyframeTrack::boolean("Target.visible", vec![0.0, 0.5, 1.0], &[false, true, true]).unwrap(),
                KeyframeTrack::string(
                    "Target.label",
                    vec![0.0, 0.5, 1.0],
                    vec!["walk".into(), "run".into(), "run".into()],
                )
                .unwrap(),
            ],
        )
        .unwrap(),
    );
    let handle = start(&mut mixer, &rig, &clip);

    mixer.update(0.25, &mut rig.scene);
    let node = rig.scene.get_node(rig.target).unwrap();
    assert!(!node.visible);
    assert_eq!(node.property("label"), Some(&Property::Text("walk".into())));

    mixer.update(0.5, &mut rig.scene);
    let node = rig.scene.get_node(rig.target).unwrap();
    assert!(node.visible);
    assert_eq!(node.property("label"), Some(&Property::Text("run".into())));

    mixer.stop(handle, &mut rig.scene);
    let node = rig.scene.get_node(rig.target).unwrap();
    assert!(node.visible);
    assert_eq!(node.property("label"), Some(&Property::Text("idle".into())));
}

#[test]
fn unchanged_value_is_not_rewritten() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let clip = Arc::new(
        AnimationClip::new(
            "dim",
            vec![KeyframeTrack::number("Target.material.opacity", vec![0.0, 1.0], vec![0.5, 0.5]).unwrap()],
        )
        .unwrap(),
    );
    start(&mut mixer, &rig, &clip);

    let version = |rig: &Rig| rig.scene.get_node(rig.target).unwrap().material.as_ref().unwrap().version();
    let before = version(&rig);

    mixer.update(0.1, &mut rig.scene);
    let after_first = version(&rig);
    assert_eq!(after_first, before + 1);

    for _ in 0..5 {
        mixer.update(0.1, &mut rig.scene);
    }
    assert_eq!(version(&rig), after_first, "constant value must not bump the version");

    let material = rig.scene.get_node(rig.target).unwrap().material.as_ref().unwrap();
    assert!(approx(material.scalar("opacity").unwrap(), 0.5));
}

#[test]
fn zero_delta_reapplies_pose_over_host_writes() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    start(&mut mixer, &rig, &ramp_clip("a", 1.0));

    mixer.update(0.5, &mut rig.scene);
    rig.scene
        .get_node_mut(rig.target)
        .unwrap()
        .set_property("value", Property::Scalar(99.0));

    mixer.update(0.0, &mut rig.scene);
    assert!(approx(rig.value(), 0.5), "Expected 0.5, got {}", rig.value());
}

#[test]
fn loop_events_report_action() {
    let mut rig = rig();
    let mut mixer = AnimationMixer::new(rig.root);
    let handle = start(&mut mixer, &rig, &ramp_clip("a", 1.0));

    mixer.update(2.5, &mut rig.scene);
    let events = mixer.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action(), handle);
    assert!(matches!(events[0], MixerEvent::Loop { loop_delta: 2, .. }));
    assert!(mixer.drain_events().is_empty());
}
