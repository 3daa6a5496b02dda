use std::{fs, process::Command};

fn rabbit_escape() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rabbit-escape"))
}

#[test]
fn normalize_prints_canonical_encoding() {
    let output = rabbit_escape()
        .args(["normalize", " 7: 12, 3,4,bash ;2,-1,0,levitate"])
        .output()
        .expect("failed to run rabbit-escape");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), "7:12,3,4,bash;2,-1,0,levitate");
}

#[test]
fn decode_rejects_unknown_ability() {
    let output = rabbit_escape()
        .args(["decode", "1:0,0,0,fly"])
        .output()
        .expect("failed to run rabbit-escape");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fly"), "unexpected stderr: {stderr}");
}

#[test]
fn verify_reports_outcome_through_exit_status() {
    let scenario = std::path::Path::new(env!("CARGO_TARGET_TMPDIR")).join("corridor.toml");
    fs::write(
        &scenario,
        "required_rescues = 1\n\
         terrain = [\"Q...O\", \"#####\"]\n\
         \n\
         [[spawns]]\n\
         x = 0\n\
         y = 0\n\
         facing = \"right\"\n",
    )
    .expect("scenario written");

    let won = rabbit_escape()
        .args(["verify", "--solution", "0:", "--scenario"])
        .arg(&scenario)
        .output()
        .expect("failed to run rabbit-escape");
    assert!(won.status.success());
    assert!(String::from_utf8_lossy(&won.stdout).contains("outcome:     won"));

    let timed_out = rabbit_escape()
        .args(["verify", "--solution", "0:", "--max-ticks", "2", "--scenario"])
        .arg(&scenario)
        .output()
        .expect("failed to run rabbit-escape");
    assert!(!timed_out.status.success());
    assert!(String::from_utf8_lossy(&timed_out.stdout).contains("timed-out"));
}
