// End-to-end conversion of TAP text into TeamCity service message chunks
use tap_teamcity::{transform, ReporterConfig, TapTeamCity};

/// Push every input piece through a converter, end it, and collect the chunks
fn convert(input: &[&str]) -> (Vec<String>, TapTeamCity) {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut stream = TapTeamCity::new();
    let mut chunks = Vec::new();
    for piece in input {
        stream.write_input(piece.as_bytes()).unwrap();
        chunks.extend(stream.drain_chunks());
    }
    stream.end_input().unwrap();
    chunks.extend(stream.drain_chunks());
    assert!(stream.is_ended(), "stream should end");
    (chunks, stream)
}

fn is_integer(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

/// Pull the duration value out of a finished message
fn duration_of(chunk: &str) -> &str {
    let start = chunk.find("duration='").expect("duration attribute") + "duration='".len();
    let end = chunk[start..].find('\'').expect("closing quote") + start;
    &chunk[start..end]
}

#[test]
fn test_suite_messages() {
    let (chunks, stream) = convert(&["# first test"]);

    assert_eq!(chunks[0], "\n##teamcity[testSuiteStarted name='first test']");
    assert!(chunks[1].starts_with("\n##teamcity[testSuiteFinished name='first test'"));
    assert!(is_integer(duration_of(&chunks[1])));
    assert_eq!(chunks[2], "\n");
    assert_eq!(chunks.len(), 3);
    assert!(!stream.failed());
}

#[test]
fn test_ok_assertion() {
    let (chunks, stream) = convert(&["ok 1 first assert"]);

    assert_eq!(
        chunks[0],
        "\n##teamcity[testStarted name='first assert' captureStandardOutput='true']"
    );
    assert!(chunks[1].starts_with("\n##teamcity[testFinished name='first assert'"));
    assert_eq!(chunks[2], "\n");
    assert_eq!(chunks.len(), 3);
    assert!(!stream.failed());
}

#[test]
fn test_not_ok_assertion() {
    let (chunks, stream) = convert(&[
        "not ok 2 second assert\n  ---\n    operator: equal\n    expected: false\n    actual:   true\n   at: Test.<anonymous> (./tap-teamcity.js:15:5)\n  ...",
    ]);

    assert_eq!(
        chunks[0],
        "\n##teamcity[testStarted name='second assert' captureStandardOutput='true']"
    );
    assert_eq!(
        chunks[1],
        "\n##teamcity[testFailed name='second assert' type='comparisonFailure' expected='false' actual='true']"
    );
    assert!(chunks[2].starts_with("\n##teamcity[testFinished name='second assert'"));
    assert!(stream.failed());
}

#[test]
fn test_escaping() {
    let (chunks, _) = convert(&["# escaped characters: ' | [ ]"]);

    let expected = "escaped characters: |' || |[ |]";
    assert_eq!(
        chunks[0],
        format!("\n##teamcity[testSuiteStarted name='{}']", expected)
    );
    assert!(chunks[1].starts_with(&format!(
        "\n##teamcity[testSuiteFinished name='{}'",
        expected
    )));
}

#[test]
fn test_full_run_in_order() {
    let tap = "TAP version 13\n\
               # addition\n\
               ok 1 adds numbers\n\
               # subtraction\n\
               ok 2 subtracts numbers\n\
               not ok 3 handles negatives\n  ---\n    operator: equal\n    expected: -1\n    actual: 1\n  ...\n\
               \n\
               1..3\n\
               # tests 3\n\
               # pass  2\n\
               # fail  1\n";

    let (chunks, stream) = convert(&[tap]);
    let names: Vec<&str> = chunks
        .iter()
        .map(|c| {
            c.trim_start_matches("\n##teamcity[")
                .split(' ')
                .next()
                .unwrap_or("")
        })
        .collect();

    assert_eq!(
        names,
        vec![
            "testSuiteStarted",
            "testStarted",
            "testFinished",
            "testSuiteFinished",
            "testSuiteStarted",
            "testStarted",
            "testFinished",
            "testStarted",
            "testFailed",
            "testFinished",
            "testSuiteFinished",
            "\n",
        ]
    );
    assert!(chunks[8].contains("expected='-1' actual='1'"));
    assert!(stream.failed());

    let summary = stream.summary().expect("summary after end");
    assert_eq!(summary.tests, 2);
    assert_eq!(summary.asserts, 3);
    assert_eq!(summary.fail, 1);
}

#[test]
fn test_byte_at_a_time_matches_whole() {
    let tap = "# suite\nok 1 one\nnot ok 2 two\n  ---\n    expected: 'a'\n    actual: 'b'\n  ...\n";

    let mut whole = Vec::new();
    transform(tap.as_bytes(), &mut whole, &ReporterConfig::default()).unwrap();

    let pieces: Vec<String> = tap.chars().map(String::from).collect();
    let piece_refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
    let (chunks, _) = convert(&piece_refs);

    let strip = |text: &str| {
        text.split('\n')
            .map(|line| match line.find(" duration='") {
                Some(idx) => line[..idx].to_string(),
                None => line.to_string(),
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(
        strip(&chunks.concat()),
        strip(&String::from_utf8(whole).unwrap())
    );
    assert!(chunks.concat().contains("expected='|'a|'' actual='|'b|''"));
}

#[test]
fn test_capture_standard_output_setting() {
    let config = ReporterConfig::new().with_capture_standard_output(false);
    let mut output = Vec::new();
    transform(&b"ok 1 quiet\n"[..], &mut output, &config).unwrap();

    let text = String::from_utf8(output).unwrap();
    assert!(text.starts_with("\n##teamcity[testStarted name='quiet' captureStandardOutput='false']"));
}

#[test]
fn test_unclosed_diagnostics_do_not_hide_later_tests() {
    let (chunks, stream) = convert(&[
        "not ok 1 bad\n  ---\n    expected: 1\n    actual: 2\n# second suite\nok 2 good\nnot ok 3 also bad\n",
    ]);
    let text = chunks.concat();

    assert!(text.contains("testFailed name='bad' type='comparisonFailure' expected='1' actual='2'"));
    assert!(text.contains("testSuiteStarted name='second suite'"));
    assert!(text.contains("testStarted name='good'"));
    assert!(text.contains("testFailed name='also bad']"));
    assert_eq!(chunks.last().map(String::as_str), Some("\n"));
    assert!(stream.failed());
}

#[test]
fn test_multiline_comparison_values() {
    let (chunks, _) = convert(&[
        "not ok 1 should be deeply equivalent\n  ---\n    operator: deepEqual\n    expected: |-\n      { a: 1 }\n    actual: |-\n      { a: 2 }\n  ...\n",
    ]);

    assert_eq!(
        chunks[1],
        "\n##teamcity[testFailed name='should be deeply equivalent' type='comparisonFailure' expected='{ a: 1 }' actual='{ a: 2 }']"
    );
}
