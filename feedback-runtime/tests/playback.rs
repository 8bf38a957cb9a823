//! 从 setup 构建播放器并按帧驱动的端到端测试。

use feedback_runtime::{
    Clock, EffectCx, FeedbackBehavior, FeedbackRegistry, FeedbackPlayer, PlayerEvent, PlayerId,
    PlayerSetup, TimescaleMode, Vec3, analyze_player,
};
use serde::Deserialize;

/// 播放时发出一个 `blip` 信号
#[derive(Debug, Clone, Default, Deserialize)]
struct Blip {
    #[serde(default)]
    duration: f32,
}

impl FeedbackBehavior for Blip {
    fn kind(&self) -> &'static str {
        "blip"
    }

    fn play(&mut self, cx: &mut EffectCx, _position: Vec3, intensity: f32) {
        cx.emit("blip", intensity);
    }

    fn duration(&self) -> f32 {
        self.duration
    }
}

const DT: f32 = 0.125;

fn build(json: &str) -> FeedbackPlayer {
    let mut registry = FeedbackRegistry::with_builtin();
    registry.register_serde::<Blip>("blip");

    let setup = PlayerSetup::from_json(json).unwrap();
    let mut player = setup.build(PlayerId::new(1), &registry).unwrap().player.with_seed(3);
    player.initialize();
    player
}

/// 推进若干帧，记录 `时间 事件`
fn timeline(player: &mut FeedbackPlayer, clock: &mut Clock, frames: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for _ in 0..frames {
        let frame = clock.advance(DT);
        for event in player.tick(frame) {
            lines.push(format!("{:.3} {}", frame.unscaled_time, event));
        }
    }
    lines
}

fn count_signals(events: &[String]) -> usize {
    events.iter().filter(|line| line.contains("signal")).count()
}

#[test]
fn test_pause_timeline() {
    let mut player = build(
        r#"{
            "feedbacks": [
                { "type": "blip", "label": "First", "params": { "duration": 0.2 } },
                { "type": "pause", "params": { "pause_duration": 0.5 } },
                { "type": "blip", "label": "Second", "channel": 2, "params": { "duration": 0.2 } }
            ]
        }"#,
    );
    let mut clock = Clock::new();

    player.play();
    let lines = timeline(&mut player, &mut clock, 16);
    insta::assert_debug_snapshot!(lines, @r#"
    [
        "0.125 play",
        "0.125 signal blip [First] ch0 = 1.000",
        "0.500 resume",
        "0.500 signal blip [Second] ch2 = 1.000",
        "0.750 complete",
    ]
    "#);
    assert!(!player.is_playing());
}

#[test]
fn test_repeats_then_complete() {
    let mut player = build(
        r#"{
            "feedbacks": [
                {
                    "type": "blip",
                    "params": { "duration": 0.25 },
                    "timing": { "number_of_repeats": 2, "delay_between_repeats": 0.25 }
                }
            ]
        }"#,
    );
    assert_eq!(player.total_duration(), 1.25);
    let mut clock = Clock::new();

    player.play();
    let lines = timeline(&mut player, &mut clock, 24);
    assert_eq!(count_signals(&lines), 3);
    assert_eq!(lines.last().map(String::as_str), Some("1.500 complete"));
}

#[test]
fn test_scaled_time_slows_repeats() {
    let json = r#"{
        "feedbacks": [
            {
                "type": "blip",
                "params": { "duration": 0.25 },
                "timing": { "number_of_repeats": 1, "delay_between_repeats": 0.25 }
            }
        ]
    }"#;

    // 缩放时间下第二次触发要等到非缩放的 1.0 秒
    let mut player = build(json);
    let mut clock = Clock::new();
    clock.set_time_scale(0.5);
    player.play();
    let early = timeline(&mut player, &mut clock, 6);
    assert_eq!(count_signals(&early), 1);
    let late = timeline(&mut player, &mut clock, 4);
    assert_eq!(count_signals(&late), 1);

    // 强制非缩放时间后不受 time_scale 影响
    let mut player = build(json);
    player.settings.forced_timescale = Some(TimescaleMode::Unscaled);
    let mut clock = Clock::new();
    clock.set_time_scale(0.5);
    player.play();
    let early = timeline(&mut player, &mut clock, 6);
    assert_eq!(count_signals(&early), 2);
}

#[test]
fn test_sequence_drives_plays() {
    let mut player = build(
        r#"{
            "sequences": {
                "hits": {
                    "notes": [
                        { "timestamp": 0.5, "id": 1 },
                        { "timestamp": 0.0, "id": 1 },
                        { "timestamp": 0.25, "id": 1 },
                        { "timestamp": 0.25, "id": 2 }
                    ],
                    "tracks": [{ "id": 1 }, { "id": 2 }],
                    "end_silence_duration": 0.25
                }
            },
            "feedbacks": [
                { "type": "blip", "label": "Kick", "sequence": "hits", "timing": { "track_id": 1 } }
            ]
        }"#,
    );
    let mut clock = Clock::new();

    player.play();
    let lines = timeline(&mut player, &mut clock, 24);
    assert_eq!(count_signals(&lines), 3);
    assert!(lines.iter().any(|line| line.ends_with("complete")));
    assert!(!player.is_playing());
}

#[test]
fn test_repeating_sequence_plays_every_cycle() {
    let mut player = build(
        r#"{
            "sequences": {
                "pair": {
                    "notes": [
                        { "timestamp": 0.0, "id": 1 },
                        { "timestamp": 0.5, "id": 1 }
                    ],
                    "tracks": [{ "id": 1 }]
                }
            },
            "feedbacks": [
                {
                    "type": "blip",
                    "sequence": "pair",
                    "timing": { "track_id": 1, "number_of_repeats": 1, "delay_between_repeats": 0.0 }
                }
            ]
        }"#,
    );
    let mut clock = Clock::new();

    player.play();
    let lines = timeline(&mut player, &mut clock, 24);
    // 两个周期各两个音符，后一个周期不会截断前一个
    assert_eq!(count_signals(&lines), 4);
    assert!(lines.iter().any(|line| line.ends_with("complete")));
}

#[test]
fn test_replay_during_initial_delay() {
    let mut player = build(
        r#"{
            "feedbacks": [
                { "type": "blip", "timing": { "initial_delay": 0.5 } }
            ]
        }"#,
    );
    let mut clock = Clock::new();

    player.play();
    let first = timeline(&mut player, &mut clock, 2);
    assert_eq!(count_signals(&first), 0);

    player.play();
    let rest = timeline(&mut player, &mut clock, 16);
    assert_eq!(count_signals(&rest), 2);
}

#[test]
fn test_quantized_timing_on_raw_sequence_warns() {
    let player = build(
        r#"{
            "sequences": {
                "raw": { "notes": [{ "timestamp": 0.0, "id": 1 }], "tracks": [{ "id": 1 }] }
            },
            "feedbacks": [
                { "type": "blip", "sequence": "raw", "timing": { "track_id": 1, "quantized": true } }
            ]
        }"#,
    );

    let diagnostics = analyze_player(&player);
    assert_eq!(diagnostics.warn_count(), 1);
    assert!(diagnostics.diagnostics[0].message.contains("raw"));
}

#[test]
fn test_unknown_type_repaired_by_refresh_cache() {
    let mut player = build(
        r#"{
            "feedbacks": [
                { "type": "blip", "label": "A" },
                { "type": "rumble", "label": "Missing" }
            ]
        }"#,
    );

    let diagnostics = analyze_player(&player);
    assert_eq!(diagnostics.warn_count(), 1);

    player.refresh_cache();
    assert_eq!(player.len(), 1);
    assert!(analyze_player(&player).is_empty());
}

#[test]
fn test_events_carry_player_id() {
    let mut player = build(r#"{ "feedbacks": [ { "type": "blip" } ] }"#);
    let mut clock = Clock::new();

    player.play();
    let events = player.tick(clock.advance(DT));
    assert!(matches!(events.first(), Some(PlayerEvent::Play { player }) if *player == PlayerId::new(1)));
    assert!(events.iter().any(|e| matches!(e, PlayerEvent::Signal(s) if s.name == "blip")));
}
