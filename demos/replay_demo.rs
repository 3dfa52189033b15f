//! Replay a scripted rhythm session and print the verification report

use humancheck::verify::replay::{replay_script, ScriptAction, ScriptEvent, SessionScript};
use humancheck::verify::rhythm::RHYTHM_PATTERNS;
use humancheck::verify::ChallengeKind;
use humancheck::{ReportEncoder, VerificationConfig};

fn main() {
    // Seeded so the demo always hears the same pattern
    let seed = 7;
    let pattern = {
        use rand::{rngs::StdRng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(seed);
        humancheck::verify::rhythm::choose_pattern(&mut rng)
    };
    let config = VerificationConfig::default();

    let mut events = vec![
        ScriptEvent {
            at_ms: 0,
            action: ScriptAction::Start,
        },
        ScriptEvent {
            at_ms: 0,
            action: ScriptAction::Select {
                challenge: ChallengeKind::Rhythm,
            },
        },
    ];

    // Drift the pointer around while listening and playing
    let play_at = pattern.duration_ms() as u64 + config.listen_grace_ms;
    let mut t = 40;
    let (mut x, mut y) = (120.0, 80.0);
    while t < play_at + 2_000 {
        x += if t % 3 == 0 { 5.5 } else { 1.5 };
        y += if t % 2 == 0 { 2.0 } else { -1.0 };
        events.push(ScriptEvent {
            at_ms: t,
            action: ScriptAction::Pointer { x, y },
        });
        t += if t % 4 == 0 { 45 } else { 35 };
    }

    // Tap the pattern back with a little human slop
    let slop = [0i64, 35, -20, 40, -15];
    let start = play_at + 300;
    for (beat, err) in pattern.beats.iter().zip(slop.iter().cycle()) {
        let at = (start as i64 + *beat as i64 + err).max(start as i64) as u64;
        events.push(ScriptEvent {
            at_ms: at,
            action: ScriptAction::Tap,
        });
    }
    events.sort_by_key(|e| e.at_ms);

    println!(
        "Pattern '{}' among {} ({} beats)",
        pattern.name,
        RHYTHM_PATTERNS.len(),
        pattern.beat_count()
    );

    let script = SessionScript {
        seed: Some(seed),
        events,
    };
    match replay_script(&script, config)
        .and_then(|outcome| ReportEncoder::new().encode_outcome(&outcome))
        .and_then(|report| Ok(serde_json::to_string_pretty(&report)?))
    {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: {e}"),
    }
}
