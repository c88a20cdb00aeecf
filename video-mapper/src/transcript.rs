use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Checks that a transcript is a well-formed markup fragment: tags balanced
/// and properly nested, attributes well-formed, only predefined or numeric
/// entity references. Several top-level elements and bare text are fine.
pub fn is_well_formed(transcript: &str) -> bool {
    check_fragment(transcript).unwrap_or(false)
}

fn check_fragment(transcript: &str) -> Result<bool, quick_xml::Error> {
    let mut reader = Reader::from_str(transcript);
    reader.check_end_names(true);

    let mut depth: usize = 0;
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                check_attributes(&start)?;
                depth += 1;
            }
            Event::Empty(start) => check_attributes(&start)?,
            Event::End(_) => match depth.checked_sub(1) {
                Some(remaining) => depth = remaining,
                None => return Ok(false),
            },
            Event::Text(text) => {
                text.unescape()?;
            }
            Event::Eof => return Ok(depth == 0),
            _ => {}
        }
    }
}

fn check_attributes(start: &BytesStart<'_>) -> Result<(), quick_xml::Error> {
    for attribute in start.attributes() {
        attribute?.unescape_value()?;
    }
    Ok(())
}
