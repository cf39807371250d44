//! XML signature fragments (`http://www.w3.org/2000/09/xmldsig#`).
//!
//! ISO 15118-2 signs message parts by computing digests over the EXI fragment
//! encoding of the referenced elements and over `SignedInfo` itself. The fragment
//! root table lists the 45 xmldsig element declarations sorted by local name,
//! followed by `SE(*)` and `ED`.

use crate::codec::{no_step, CodecError, ExiDocument, ExiElement};
use crate::grammar::{
    Attribute, ComplexType, DocumentGrammar, Occurs, Particle, RootElement, RootKind, SimpleType,
    Term,
};
use crate::value::{ExiArray, ExiBytes, ExiString, FieldMut, FieldRef};

pub const NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const ALGORITHM_LEN: usize = 65;
pub const URI_LEN: usize = 65;
pub const ID_LEN: usize = 65;
pub const XPATH_LEN: usize = 65;
pub const DIGEST_VALUE_LEN: usize = 350;
pub const REFERENCE_MAX: usize = 4;
pub const TRANSFORM_MAX: usize = 1;
pub const XPATH_MAX: usize = 1;

const ALGORITHM: Attribute = Attribute::required("Algorithm", SimpleType::string(ALGORITHM_LEN));

static CANONICALIZATION_METHOD_TYPE: ComplexType = ComplexType {
    name: "CanonicalizationMethodType",
    attributes: &[ALGORITHM],
    particles: &[Particle::any()],
    mixed: true,
};

static DIGEST_METHOD_TYPE: ComplexType = ComplexType {
    name: "DigestMethodType",
    attributes: &[ALGORITHM],
    particles: &[Particle::any()],
    mixed: true,
};

static SIGNATURE_METHOD_TYPE: ComplexType = ComplexType {
    name: "SignatureMethodType",
    attributes: &[ALGORITHM],
    particles: &[
        Particle::optional("HMACOutputLength", Term::Simple(SimpleType::INTEGER)),
        Particle::any(),
    ],
    mixed: true,
};

// The schema content is a repeated choice of `any | XPath`. It is tabled as
// `XPath*` followed by the wildcard, which covers every stream that uses only
// XPath children. The wildcard is never emitted and is rejected on decode, so
// XPath after a wildcard child cannot occur in accepted input.
static TRANSFORM_TYPE: ComplexType = ComplexType {
    name: "TransformType",
    attributes: &[ALGORITHM],
    particles: &[
        Particle::new(
            "XPath",
            Term::Simple(SimpleType::string(XPATH_LEN)),
            Occurs::ANY,
        ),
        Particle::any(),
    ],
    mixed: true,
};

static TRANSFORMS_TYPE: ComplexType = ComplexType {
    name: "TransformsType",
    attributes: &[],
    particles: &[Particle::new(
        "Transform",
        Term::Complex(&TRANSFORM_TYPE),
        Occurs::at_least(1),
    )],
    mixed: false,
};

static REFERENCE_TYPE: ComplexType = ComplexType {
    name: "ReferenceType",
    attributes: &[
        Attribute::optional("Id", SimpleType::string(ID_LEN)),
        Attribute::optional("Type", SimpleType::string(URI_LEN)),
        Attribute::optional("URI", SimpleType::string(URI_LEN)),
    ],
    particles: &[
        Particle::optional("Transforms", Term::Complex(&TRANSFORMS_TYPE)),
        Particle::one("DigestMethod", Term::Complex(&DIGEST_METHOD_TYPE)),
        Particle::one(
            "DigestValue",
            Term::Simple(SimpleType::base64(DIGEST_VALUE_LEN)),
        ),
    ],
    mixed: false,
};

static SIGNED_INFO_TYPE: ComplexType = ComplexType {
    name: "SignedInfoType",
    attributes: &[Attribute::optional("Id", SimpleType::string(ID_LEN))],
    particles: &[
        Particle::one(
            "CanonicalizationMethod",
            Term::Complex(&CANONICALIZATION_METHOD_TYPE),
        ),
        Particle::one("SignatureMethod", Term::Complex(&SIGNATURE_METHOD_TYPE)),
        Particle::new(
            "Reference",
            Term::Complex(&REFERENCE_TYPE),
            Occurs::at_least(1),
        ),
    ],
    mixed: false,
};

pub static GRAMMAR: DocumentGrammar = DocumentGrammar {
    name: "xmldsig",
    namespace: NAMESPACE,
    kind: RootKind::Fragment,
    roots: &[
        RootElement::modelled("CanonicalizationMethod", &CANONICALIZATION_METHOD_TYPE),
        RootElement::declared("DSAKeyValue"),
        RootElement::modelled("DigestMethod", &DIGEST_METHOD_TYPE),
        RootElement::declared("DigestValue"),
        RootElement::declared("Exponent"),
        RootElement::declared("G"),
        RootElement::declared("HMACOutputLength"),
        RootElement::declared("J"),
        RootElement::declared("KeyInfo"),
        RootElement::declared("KeyName"),
        RootElement::declared("KeyValue"),
        RootElement::declared("Manifest"),
        RootElement::declared("MgmtData"),
        RootElement::declared("Modulus"),
        RootElement::declared("Object"),
        RootElement::declared("P"),
        RootElement::declared("PGPData"),
        RootElement::declared("PGPKeyID"),
        RootElement::declared("PGPKeyPacket"),
        RootElement::declared("PgenCounter"),
        RootElement::declared("Q"),
        RootElement::declared("RSAKeyValue"),
        RootElement::modelled("Reference", &REFERENCE_TYPE),
        RootElement::declared("RetrievalMethod"),
        RootElement::declared("SPKIData"),
        RootElement::declared("SPKISexp"),
        RootElement::declared("Seed"),
        RootElement::declared("Signature"),
        RootElement::modelled("SignatureMethod", &SIGNATURE_METHOD_TYPE),
        RootElement::declared("SignatureProperties"),
        RootElement::declared("SignatureProperty"),
        RootElement::declared("SignatureValue"),
        RootElement::modelled("SignedInfo", &SIGNED_INFO_TYPE),
        RootElement::modelled("Transform", &TRANSFORM_TYPE),
        RootElement::modelled("Transforms", &TRANSFORMS_TYPE),
        RootElement::declared("X509CRL"),
        RootElement::declared("X509Certificate"),
        RootElement::declared("X509Data"),
        RootElement::declared("X509IssuerName"),
        RootElement::declared("X509IssuerSerial"),
        RootElement::declared("X509SKI"),
        RootElement::declared("X509SerialNumber"),
        RootElement::declared("X509SubjectName"),
        RootElement::declared("XPath"),
        RootElement::declared("Y"),
    ],
};

fn optional_chars<const N: usize>(value: &Option<ExiString<N>>) -> FieldRef<'_> {
    value
        .as_ref()
        .map_or(FieldRef::Absent, |s| FieldRef::Chars(s.as_str()))
}

/// Element carrying only an `Algorithm` attribute: CanonicalizationMethod and
/// DigestMethod.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Method {
    pub algorithm: ExiString<ALGORITHM_LEN>,
}

pub type CanonicalizationMethod = Method;
pub type DigestMethod = Method;

impl Method {
    pub fn new(algorithm: &str) -> Result<Self, CodecError> {
        Ok(Method {
            algorithm: ExiString::try_from(algorithm)?,
        })
    }
}

impl ExiElement for Method {
    fn occurrences(&self, step: usize) -> usize {
        (step == 0) as usize
    }

    fn field(&self, step: usize, _occurrence: usize) -> FieldRef<'_> {
        match step {
            0 => FieldRef::Chars(self.algorithm.as_str()),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, _occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        match step {
            0 => Ok(FieldMut::Chars(&mut self.algorithm)),
            _ => Err(no_step("MethodType", step)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureMethod {
    pub algorithm: ExiString<ALGORITHM_LEN>,
    pub hmac_output_length: Option<i64>,
}

impl ExiElement for SignatureMethod {
    fn occurrences(&self, step: usize) -> usize {
        match step {
            0 => 1,
            1 => self.hmac_output_length.is_some() as usize,
            _ => 0,
        }
    }

    fn field(&self, step: usize, _occurrence: usize) -> FieldRef<'_> {
        match (step, self.hmac_output_length) {
            (0, _) => FieldRef::Chars(self.algorithm.as_str()),
            (1, Some(len)) => FieldRef::Signed(len),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, _occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        match step {
            0 => Ok(FieldMut::Chars(&mut self.algorithm)),
            1 => Ok(FieldMut::I64(self.hmac_output_length.get_or_insert(0))),
            _ => Err(no_step("SignatureMethodType", step)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transform {
    pub algorithm: ExiString<ALGORITHM_LEN>,
    pub xpath: ExiArray<ExiString<XPATH_LEN>, XPATH_MAX>,
}

impl Transform {
    pub fn new(algorithm: &str) -> Result<Self, CodecError> {
        Ok(Transform {
            algorithm: ExiString::try_from(algorithm)?,
            xpath: ExiArray::new(),
        })
    }
}

impl ExiElement for Transform {
    fn occurrences(&self, step: usize) -> usize {
        match step {
            0 => 1,
            1 => self.xpath.len(),
            _ => 0,
        }
    }

    fn field(&self, step: usize, occurrence: usize) -> FieldRef<'_> {
        match (step, self.xpath.get(occurrence)) {
            (0, _) => FieldRef::Chars(self.algorithm.as_str()),
            (1, Some(x)) => FieldRef::Chars(x.as_str()),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        match step {
            0 => Ok(FieldMut::Chars(&mut self.algorithm)),
            1 => Ok(FieldMut::Chars(self.xpath.slot(occurrence)?)),
            _ => Err(no_step("TransformType", step)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transforms {
    pub transform: ExiArray<Transform, TRANSFORM_MAX>,
}

impl ExiElement for Transforms {
    fn occurrences(&self, step: usize) -> usize {
        match step {
            0 => self.transform.len(),
            _ => 0,
        }
    }

    fn field(&self, step: usize, occurrence: usize) -> FieldRef<'_> {
        match (step, self.transform.get(occurrence)) {
            (0, Some(t)) => FieldRef::Element(t),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        match step {
            0 => Ok(FieldMut::Element(self.transform.slot(occurrence)?)),
            _ => Err(no_step("TransformsType", step)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reference {
    pub id: Option<ExiString<ID_LEN>>,
    pub type_: Option<ExiString<URI_LEN>>,
    pub uri: Option<ExiString<URI_LEN>>,
    pub transforms: Option<Transforms>,
    pub digest_method: DigestMethod,
    pub digest_value: ExiBytes<DIGEST_VALUE_LEN>,
}

impl ExiElement for Reference {
    fn occurrences(&self, step: usize) -> usize {
        match step {
            0 => self.id.is_some() as usize,
            1 => self.type_.is_some() as usize,
            2 => self.uri.is_some() as usize,
            3 => self.transforms.is_some() as usize,
            4 | 5 => 1,
            _ => 0,
        }
    }

    fn field(&self, step: usize, _occurrence: usize) -> FieldRef<'_> {
        match step {
            0 => optional_chars(&self.id),
            1 => optional_chars(&self.type_),
            2 => optional_chars(&self.uri),
            3 => self
                .transforms
                .as_ref()
                .map_or(FieldRef::Absent, |t| FieldRef::Element(t)),
            4 => FieldRef::Element(&self.digest_method),
            5 => FieldRef::Bytes(self.digest_value.as_slice()),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, _occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        Ok(match step {
            0 => FieldMut::Chars(self.id.get_or_insert_with(ExiString::new)),
            1 => FieldMut::Chars(self.type_.get_or_insert_with(ExiString::new)),
            2 => FieldMut::Chars(self.uri.get_or_insert_with(ExiString::new)),
            3 => FieldMut::Element(self.transforms.get_or_insert_with(Default::default)),
            4 => FieldMut::Element(&mut self.digest_method),
            5 => FieldMut::Bytes(&mut self.digest_value),
            _ => return Err(no_step("ReferenceType", step)),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignedInfo {
    pub id: Option<ExiString<ID_LEN>>,
    pub canonicalization_method: CanonicalizationMethod,
    pub signature_method: SignatureMethod,
    pub reference: ExiArray<Reference, REFERENCE_MAX>,
}

impl ExiElement for SignedInfo {
    fn occurrences(&self, step: usize) -> usize {
        match step {
            0 => self.id.is_some() as usize,
            1 | 2 => 1,
            3 => self.reference.len(),
            _ => 0,
        }
    }

    fn field(&self, step: usize, occurrence: usize) -> FieldRef<'_> {
        match step {
            0 => optional_chars(&self.id),
            1 => FieldRef::Element(&self.canonicalization_method),
            2 => FieldRef::Element(&self.signature_method),
            3 => self
                .reference
                .get(occurrence)
                .map_or(FieldRef::Absent, |r| FieldRef::Element(r)),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        Ok(match step {
            0 => FieldMut::Chars(self.id.get_or_insert_with(ExiString::new)),
            1 => FieldMut::Element(&mut self.canonicalization_method),
            2 => FieldMut::Element(&mut self.signature_method),
            3 => FieldMut::Element(self.reference.slot(occurrence)?),
            _ => return Err(no_step("SignedInfoType", step)),
        })
    }
}

/// An xmldsig fragment holding one element.
#[derive(Debug, Clone, PartialEq)]
pub enum XmldsigFragment {
    CanonicalizationMethod(CanonicalizationMethod),
    DigestMethod(DigestMethod),
    Reference(Reference),
    SignatureMethod(SignatureMethod),
    SignedInfo(SignedInfo),
    Transform(Transform),
    Transforms(Transforms),
}

impl ExiDocument for XmldsigFragment {
    fn grammar() -> &'static DocumentGrammar {
        &GRAMMAR
    }

    fn root_name(&self) -> &'static str {
        match self {
            XmldsigFragment::CanonicalizationMethod(_) => "CanonicalizationMethod",
            XmldsigFragment::DigestMethod(_) => "DigestMethod",
            XmldsigFragment::Reference(_) => "Reference",
            XmldsigFragment::SignatureMethod(_) => "SignatureMethod",
            XmldsigFragment::SignedInfo(_) => "SignedInfo",
            XmldsigFragment::Transform(_) => "Transform",
            XmldsigFragment::Transforms(_) => "Transforms",
        }
    }

    fn root(&self) -> &dyn ExiElement {
        match self {
            XmldsigFragment::CanonicalizationMethod(m) | XmldsigFragment::DigestMethod(m) => m,
            XmldsigFragment::Reference(m) => m,
            XmldsigFragment::SignatureMethod(m) => m,
            XmldsigFragment::SignedInfo(m) => m,
            XmldsigFragment::Transform(m) => m,
            XmldsigFragment::Transforms(m) => m,
        }
    }

    fn root_mut(&mut self) -> &mut dyn ExiElement {
        match self {
            XmldsigFragment::CanonicalizationMethod(m) | XmldsigFragment::DigestMethod(m) => m,
            XmldsigFragment::Reference(m) => m,
            XmldsigFragment::SignatureMethod(m) => m,
            XmldsigFragment::SignedInfo(m) => m,
            XmldsigFragment::Transform(m) => m,
            XmldsigFragment::Transforms(m) => m,
        }
    }

    fn with_root(name: &str) -> Option<Self> {
        Some(match name {
            "CanonicalizationMethod" => XmldsigFragment::CanonicalizationMethod(Method::default()),
            "DigestMethod" => XmldsigFragment::DigestMethod(Method::default()),
            "Reference" => XmldsigFragment::Reference(Reference::default()),
            "SignatureMethod" => XmldsigFragment::SignatureMethod(SignatureMethod::default()),
            "SignedInfo" => XmldsigFragment::SignedInfo(SignedInfo::default()),
            "Transform" => XmldsigFragment::Transform(Transform::default()),
            "Transforms" => XmldsigFragment::Transforms(Transforms::default()),
            _ => return None,
        })
    }
}
