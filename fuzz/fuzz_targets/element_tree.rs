#![no_main]

//! Fuzz target for the element tree: parsing arbitrary bytes must never
//! panic, and rendering a parsed tree must be stable.

use libfuzzer_sys::fuzz_target;
use mkvkit::elements::SEGMENT;
use mkvkit::Node;

fuzz_target!(|data: &[u8]| {
    if data.len() > 256 * 1024 {
        return;
    }
    let Ok(node) = Node::parse(data, SEGMENT) else {
        return;
    };
    if let Ok(rendered) = node.render() {
        let reparsed = Node::parse(&rendered, SEGMENT).expect("rendered tree must parse");
        let again = reparsed.render().expect("reparsed tree must render");
        assert_eq!(again, rendered, "rendering is not stable");
    }

    let mut fixed = node.clone();
    fixed.fix_mandatory_elements();
    let mut twice = fixed.clone();
    twice.fix_mandatory_elements();
    assert_eq!(
        fixed.render().ok(),
        twice.render().ok(),
        "fixing mandatory elements is not idempotent"
    );
    let _ = node.validate();
});
