use quick_xml::events::Event;
use quick_xml::Reader;

use crate::Result;

/// Extract the public identities named by a service-profile document.
///
/// The IRS cache tracks its associated-IMPU set against the identities the
/// HSS lists in the profile XML, so callers feed a freshly received profile
/// through this before handing it to the cache.
pub fn extract_identities(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut identities = Vec::new();
    let mut in_public_identity = false;
    let mut in_identity = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"PublicIdentity" => in_public_identity = true,
                b"Identity" if in_public_identity => in_identity = true,
                _ => {}
            },
            Event::End(e) => match e.name().as_ref() {
                b"PublicIdentity" => in_public_identity = false,
                b"Identity" => in_identity = false,
                _ => {}
            },
            Event::Text(t) if in_identity => {
                let identity = t.unescape()?.into_owned();
                if !identities.contains(&identity) {
                    identities.push(identity);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(identities)
}
