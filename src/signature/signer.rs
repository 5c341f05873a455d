//! XML signature creation.
//!
//! Builds the enveloped `<ds:Signature>` for an assertion: digest the
//! canonical serialization of the unsigned element, assemble `SignedInfo`,
//! and sign its canonical form through the [`SigningKey`] capability.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{SamlError, SamlResult};

use super::{
    base64_encode, digest, SignatureConfig, SigningKey, XmlSignature,
};

/// Creates a signature over the canonical form of `unsigned_xml`.
///
/// `reference_id` is the ID of the element being signed, without the `#`
/// prefix. The returned signature is attached to the assertion by the
/// caller and emitted immediately after the Issuer on the next
/// serialization, per the SAML 2.0 signature placement convention.
pub(crate) fn create_signature(
    unsigned_xml: &str,
    reference_id: &str,
    key: &dyn SigningKey,
    config: &SignatureConfig,
) -> SamlResult<XmlSignature> {
    let algorithm = key.algorithm();
    if algorithm.is_deprecated() {
        return Err(SamlError::SignatureCreation(
            "refusing to create a SHA-1 signature".to_string(),
        ));
    }

    let canonical_element = canonicalize(unsigned_xml);
    let digest_value = base64_encode(&digest(algorithm, canonical_element.as_bytes())?);

    let mut signature = XmlSignature {
        algorithm,
        canonicalization: config.canonicalization,
        reference_uri: format!("#{reference_id}"),
        digest_value,
        signature_value: String::new(),
        x509_certificate: None,
    };

    let canonical_signed_info = canonicalize(&signed_info_markup(&signature));
    let raw_signature = key.sign(canonical_signed_info.as_bytes())?;
    signature.signature_value = base64_encode(&raw_signature);

    if config.include_certificate {
        signature.x509_certificate = key.certificate_der().map(base64_encode);
    }

    Ok(signature)
}

/// Builds the `SignedInfo` markup that is canonicalized and signed.
///
/// Verification rebuilds the same markup from the stored signature fields,
/// so this function is the single source of the signed byte layout.
pub(crate) fn signed_info_markup(signature: &XmlSignature) -> String {
    format!(
        r##"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
<ds:CanonicalizationMethod Algorithm="{c14n}"/>
<ds:SignatureMethod Algorithm="{sig_alg}"/>
<ds:Reference URI="{reference}">
<ds:Transforms>
<ds:Transform Algorithm="http://www.w3.org/2000/09/xmldsig#enveloped-signature"/>
<ds:Transform Algorithm="{c14n}"/>
</ds:Transforms>
<ds:DigestMethod Algorithm="{digest_alg}"/>
<ds:DigestValue>{digest}</ds:DigestValue>
</ds:Reference>
</ds:SignedInfo>"##,
        c14n = signature.canonicalization.uri(),
        sig_alg = signature.algorithm.uri(),
        reference = signature.reference_uri,
        digest_alg = signature.algorithm.digest_uri(),
        digest = signature.digest_value,
    )
}

impl XmlSignature {
    /// Writes the `<ds:Signature>` element into `writer`.
    ///
    /// Emitted immediately after the Issuer element by the assertion
    /// serializer.
    pub fn write_xml<W: Write>(&self, writer: &mut Writer<W>) -> SamlResult<()> {
        let mut start = BytesStart::new("ds:Signature");
        start.push_attribute(("xmlns:ds", "http://www.w3.org/2000/09/xmldsig#"));
        writer.write_event(Event::Start(start))?;

        writer.write_event(Event::Start(BytesStart::new("ds:SignedInfo")))?;
        let mut c14n = BytesStart::new("ds:CanonicalizationMethod");
        c14n.push_attribute(("Algorithm", self.canonicalization.uri()));
        writer.write_event(Event::Empty(c14n))?;
        let mut method = BytesStart::new("ds:SignatureMethod");
        method.push_attribute(("Algorithm", self.algorithm.uri()));
        writer.write_event(Event::Empty(method))?;

        let mut reference = BytesStart::new("ds:Reference");
        reference.push_attribute(("URI", self.reference_uri.as_str()));
        writer.write_event(Event::Start(reference))?;
        writer.write_event(Event::Start(BytesStart::new("ds:Transforms")))?;
        let mut enveloped = BytesStart::new("ds:Transform");
        enveloped.push_attribute((
            "Algorithm",
            "http://www.w3.org/2000/09/xmldsig#enveloped-signature",
        ));
        writer.write_event(Event::Empty(enveloped))?;
        let mut transform = BytesStart::new("ds:Transform");
        transform.push_attribute(("Algorithm", self.canonicalization.uri()));
        writer.write_event(Event::Empty(transform))?;
        writer.write_event(Event::End(BytesEnd::new("ds:Transforms")))?;
        let mut digest_method = BytesStart::new("ds:DigestMethod");
        digest_method.push_attribute(("Algorithm", self.algorithm.digest_uri()));
        writer.write_event(Event::Empty(digest_method))?;
        write_text_element(writer, "ds:DigestValue", &self.digest_value)?;
        writer.write_event(Event::End(BytesEnd::new("ds:Reference")))?;
        writer.write_event(Event::End(BytesEnd::new("ds:SignedInfo")))?;

        write_text_element(writer, "ds:SignatureValue", &self.signature_value)?;

        if let Some(ref certificate) = self.x509_certificate {
            writer.write_event(Event::Start(BytesStart::new("ds:KeyInfo")))?;
            writer.write_event(Event::Start(BytesStart::new("ds:X509Data")))?;
            write_text_element(writer, "ds:X509Certificate", certificate)?;
            writer.write_event(Event::End(BytesEnd::new("ds:X509Data")))?;
            writer.write_event(Event::End(BytesEnd::new("ds:KeyInfo")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("ds:Signature")))?;
        Ok(())
    }
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> SamlResult<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Normalizes XML whitespace.
///
/// Simplified canonicalization; full C14N is an external capability this
/// crate does not implement.
pub(crate) fn canonicalize(xml: &str) -> String {
    xml.split_whitespace().collect::<Vec<_>>().join(" ")
}
