//! Splitting the byte stream at arbitrary points must not change the result.

use crate::common::{
    answer_body, chunk_event, generation_event, run_reads, two_generation_fragments,
};

fn mixed_body() -> String {
    let mut body = generation_event("start");
    body.push_str(&answer_body(&two_generation_fragments()));
    body.push_str(&chunk_event(" caf\u{e9} \u{1f680}"));
    body.push_str(&generation_event("end"));
    body
}

#[test]
fn every_two_way_split_matches_unsplit() {
    let body = mixed_body();
    let bytes = body.as_bytes();
    let (expected, _) = run_reads([bytes]);
    assert_eq!(expected.len(), 2);

    for split in 0..=bytes.len() {
        let (left, right) = bytes.split_at(split);
        let (snapshot, _) = run_reads([left, right]);
        assert_eq!(snapshot, expected, "split at byte {split}");
    }
}

#[test]
fn fixed_size_reads_match_unsplit() {
    let body = mixed_body();
    let bytes = body.as_bytes();
    let (expected, _) = run_reads([bytes]);

    for size in 1..=13 {
        let (snapshot, _) = run_reads(bytes.chunks(size));
        assert_eq!(snapshot, expected, "reads of {size} bytes");
    }
}

#[test]
fn multibyte_text_survives_any_split() {
    let (expected, _) = run_reads([mixed_body().as_bytes()]);
    let answer = expected.generations()[1].final_answer();
    assert_eq!(answer, "120B caf\u{e9} \u{1f680}");
}

#[test]
fn crlf_payload_lines_are_tolerated() {
    let fragments = two_generation_fragments();
    let plain = answer_body(&fragments);
    let crlf = plain.replace("\ndata: ", "\r\ndata: ");
    let (expected, _) = run_reads([plain.as_bytes()]);
    let (snapshot, _) = run_reads([crlf.as_bytes()]);
    assert_eq!(snapshot, expected);
}
