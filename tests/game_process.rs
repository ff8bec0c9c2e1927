#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ai_dojo::prelude::*;
use tempfile::TempDir;

// writing an executable while another test forks can make exec fail with ETXTBSY
static SERIAL: Mutex<()> = Mutex::new(());

/// Plays `Game p1 p2 p3 p4 -s seed -i input -o output`: seat `i` scores `10 * (i + 1)`.
const GAME: &str = r#"#!/bin/sh
echo "seed $6, reading $8" >&2
i=0
for p in "$1" "$2" "$3" "$4"; do
    i=$((i + 1))
    echo "info: player $p got score $((i * 10))" >&2
done
echo "played $1 $2 $3 $4" > "${10}"
"#;

const BROKEN_GAME: &str = r#"#!/bin/sh
echo "loading" >&2
echo "segmentation fault in $1" >&2
exit 3
"#;

const SLOW_GAME: &str = "#!/bin/sh\nexec sleep 5\n";

/// The shell stays the game process and its `sleep` child inherits stderr.
const SLOW_GAME_WITH_CHILD: &str = "#!/bin/sh\necho started >&2\nsleep 4\necho done >&2\n";

fn game_dir(game: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    let dir = temp.path();
    for agent in ["AIAlbert.cc", "AIAlbert_1.cc", "AIDummy.o", "AIDemo.cc", "AIRandom_2.o"] {
        std::fs::write(dir.join(agent), "#define PLAYER_NAME Any\n").unwrap();
    }
    std::fs::write(dir.join("default.cnf"), "rounds 200\n").unwrap();

    let game_path = dir.join("Game");
    std::fs::write(&game_path, game).unwrap();
    std::fs::set_permissions(&game_path, std::fs::Permissions::from_mode(0o755)).unwrap();
    temp
}

fn config(dir: &Path) -> Configuration {
    Configuration::new()
        .with_compile(false)
        .with_output_dir(dir)
        .with_workers(2)
}

fn players(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn plays_a_match_with_the_game_executable() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp = game_dir(GAME);
    let dir = temp.path();
    let dojo = Dojo::new(dir, config(dir));

    let result = dojo
        .run(&players(&["Albert:0", "Dummy", "Demo", "Random"]), Seed::Fixed(17), false)
        .unwrap();

    assert_eq!(result.players, ["Albert", "Dummy", "Demo", "Random_2"].map(String::from));
    assert_eq!(result.scores, [10, 20, 30, 40]);
    assert_eq!(result.winner_name(), "Random_2");

    let written = std::fs::read_to_string(MatchFiles::for_slot(Path::new("default.cnf"), dir, 0).output).unwrap();
    assert_eq!(written.trim(), "played Albert Dummy Demo Random_2");
}

#[test]
fn evaluates_with_parallel_games() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp = game_dir(GAME);
    let dir = temp.path();
    let dojo = Dojo::new(dir, config(dir));

    let report = dojo
        .evaluate("Albert", 12, &players(&["Dummy", "Demo", "Random"]), |_| {})
        .unwrap();

    assert_eq!(report.matches, 12);
    assert_eq!(report.evaluated, "Albert_1");
    assert_eq!(report.entries.len(), 4);
    assert!(report.entry("Albert").is_none());
    for entry in &report.entries {
        assert_eq!(entry.games, 12);
    }
}

#[test]
fn failing_game_reports_its_output() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp = game_dir(BROKEN_GAME);
    let dir = temp.path();
    let dojo = Dojo::new(dir, config(dir));

    let err = dojo
        .run(&players(&["Albert", "Albert", "Albert", "Albert"]), Seed::Time, true)
        .unwrap_err();

    match err.downcast_ref::<DojoError>() {
        Some(DojoError::ExecutionFailure { stderr, .. }) => {
            assert!(stderr.contains("segmentation fault in Albert_1"), "{stderr}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn slow_game_is_killed() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp = game_dir(SLOW_GAME);
    let dir = temp.path();
    let config = config(dir).with_match_timeout(Some(Duration::from_millis(200)));
    let dojo = Dojo::new(dir, config);

    let err = dojo
        .run(&players(&["Albert", "Dummy", "Demo", "Random"]), Seed::Fixed(1), false)
        .unwrap_err();

    match err.downcast_ref::<DojoError>() {
        Some(DojoError::ExecutionFailure { status, .. }) => assert!(status.contains("timed out"), "{status}"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn timeout_does_not_wait_for_processes_spawned_by_the_game() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp = game_dir(SLOW_GAME_WITH_CHILD);
    let dir = temp.path();
    let config = config(dir).with_match_timeout(Some(Duration::from_millis(200)));
    let dojo = Dojo::new(dir, config);

    let start = Instant::now();
    let err = dojo
        .run(&players(&["Albert", "Dummy", "Demo", "Random"]), Seed::Fixed(1), false)
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    match err.downcast_ref::<DojoError>() {
        Some(DojoError::ExecutionFailure { status, stderr }) => {
            assert!(status.contains("timed out"), "{status}");
            assert!(stderr.contains("started"), "{stderr}");
            assert!(!stderr.contains("done"), "{stderr}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn compiles_before_listing_new_agents() {
    let _guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());
    let temp = game_dir(GAME);
    let dir = temp.path();
    let config = config(dir).with_compile(true).with_compile_command("touch AIBuilt.o");
    let dojo = Dojo::new(dir, config);

    let result = dojo
        .run(&players(&["Built", "Dummy", "Demo", "Random"]), Seed::Fixed(1), false)
        .unwrap();
    assert_eq!(result.players[0], "Built");

    let failing = Dojo::new(dir, self::config(dir).with_compile(true).with_compile_command("false"));
    let err = failing
        .run(&players(&["Built", "Dummy", "Demo", "Random"]), Seed::Fixed(1), false)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DojoError>(),
        Some(DojoError::Compilation { .. })
    ));
}
