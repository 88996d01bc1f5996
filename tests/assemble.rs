//! End-to-end assembly scenarios, text source in, 128-word program out.
//! Unit-level behavior lives in each module's own `#[cfg(test)] mod test`;
//! this file checks the pipeline as a whole.

use fv1asm::encode::{encode_skp, OP_SKP};
use fv1asm::output::write_binary;
use fv1asm::{assemble, Options};

fn run(src: &str) -> Vec<u32> {
    assemble(src, &Options::default()).unwrap().program
}

#[test]
fn empty_program_is_128_words_with_a_single_collapsed_skip() {
    let program = run("");
    assert_eq!(program.len(), 128);
    assert_eq!(program[0], encode_skp(0, 127, OP_SKP));
    assert!(program[1..].iter().all(|&w| w == 0x00000011));
}

#[test]
fn or_literal_three_ways_agree_bit_exact() {
    let forms = [
        "or -0.4335784912109375",
        "or 0xc88080",
        "or 1<<23|2**22|1<<19|2**15|1<<7",
    ];
    let words: Vec<u32> = forms.iter().map(|src| run(src)[0]).collect();
    assert!(words.iter().all(|&w| w == 0xC880800F));
}

#[test]
fn delay_region_accessors_resolve_to_expected_offsets() {
    let program = run("mem delay 99\nrda delay,1.0\nrda delay^,1.0\nrda delay#,1.0");
    // delay^ = start + length/2 = 0 + 49 = 49, delay# = start + length = 99.
    let addr_of = |word: u32| (word >> 5) & 0x7FFF;
    assert_eq!(addr_of(program[0]), 0);
    assert_eq!(addr_of(program[1]), 49);
    assert_eq!(addr_of(program[2]), 99);
}

#[test]
fn delay_exhaustion_past_32768_samples_errors() {
    assert!(assemble("mem a 32768", &Options::default()).is_err());
    assert!(assemble("mem a 20000\nmem b 12768", &Options::default()).is_err());
}

#[test]
fn skp_offset_boundary_of_63_is_ok_64_errors() {
    let mut ok = String::from("skp neg, target\n");
    ok.push_str(&"clr\n".repeat(63));
    ok.push_str("target: clr\n");
    assert!(assemble(&ok, &Options::default()).is_ok());

    let mut bad = String::from("skp neg, target\n");
    bad.push_str(&"clr\n".repeat(64));
    bad.push_str("target: clr\n");
    assert!(assemble(&bad, &Options::default()).is_err());
}

#[test]
fn skp_target_must_not_precede_the_skip() {
    let src = "target: clr\nskp neg, target\n";
    assert!(assemble(src, &Options::default()).is_err());
}

#[test]
fn strict_vs_clamp_overflow_on_sof() {
    assert!(assemble("sof 2.0, 0.0", &Options::default()).is_err());
    let options = Options { clamp: true, ..Options::default() };
    let result = assemble("sof 2.0, 0.0", &options).unwrap();
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn complex_power_is_an_error() {
    assert!(assemble("EQU j (-1)**(1/2)", &Options::default()).is_err());
}

#[test]
fn case_insensitive_label_references_produce_identical_words() {
    let preamble = "EQU Label_One (-1.0)\n";
    let a = run(&format!("{}Or Label_One", preamble))[0];
    let b = run(&format!("{}oR label_one", preamble))[0];
    let c = run(&format!("{}OR lAbEl_OnE", preamble))[0];
    assert_eq!(a, b);
    assert_eq!(b, c);
}

#[test]
fn caret_lexing_disambiguates_identifier_suffix_from_xor() {
    assert!(assemble("mem delay 9\nor delay^0xffff", &Options::default()).is_err());
    let a = run("mem delay 9\nor (delay)^0xffff")[0];
    let b = run("mem delay 9\nor delay^^0xffff")[0];
    assert_eq!(a, b);
}

#[test]
fn alias_mnemonics_match_their_canonical_forms() {
    assert_eq!(run("clr")[0], run("and 0")[0]);
    assert_eq!(run("not")[0], run("xor 0xffffff")[0]);
    assert_eq!(run("ldax reg0")[0], run("rdfx reg0, 0")[0]);
    assert_eq!(run("absa")[0], run("maxx 0, 0")[0]);
    assert_eq!(run("nop")[0], run("skp 0, 0")[0]);
}

#[test]
fn readme_delay_patch_matches_the_reference_byte_sequence() {
    // A pot-controlled delay patch: skip the one-time pot read/store on every
    // sample but the first, apply it as a gain on the input, and sum two taps
    // of a ~19660-sample delay line out to the left DAC.
    let src = "\
        mem delay 19660\n\
        equ gain 0.5\n\
        skp run, start\n\
        ldax pot0\n\
        wrax reg0, 0\n\
        start: ldax adcl\n\
        mulx reg0\n\
        wra delay, 0\n\
        rda delay^, 0.5\n\
        rda delay#, 0.5\n\
        wrax dacl, 0\n\
    ";
    let options = Options { explicit_nop_fill: true, ..Options::default() };
    let program = assemble(src, &options).unwrap().program;

    let expected_head: [u32; 9] = [
        0x80400011, 0x00000205, 0x00000406, 0x00000285, 0x0000040a, 0x00000002, 0x2004ccc0,
        0x20099980, 0x000002c6,
    ];
    assert_eq!(&program[..9], &expected_head);
    assert!(program[9..].iter().all(|&w| w == 0x00000011));

    let mut bytes = Vec::new();
    write_binary(&program, &mut bytes).unwrap();
    let mut expected_bytes = Vec::new();
    for word in expected_head.iter().chain(std::iter::repeat(&0x00000011u32).take(119)) {
        expected_bytes.extend_from_slice(&word.to_be_bytes());
    }
    assert_eq!(bytes, expected_bytes);
}

#[test]
fn explicit_nop_fill_flag_changes_the_padding() {
    let options = Options { explicit_nop_fill: true, ..Options::default() };
    let program = assemble("clr", &options).unwrap().program;
    assert!(program[1..].iter().all(|&w| w == 0x00000011));
}
