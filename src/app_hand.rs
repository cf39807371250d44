//! SupportedAppProtocol handshake (`urn:iso:15118:2:2010:AppProtocol`).

use crate::codec::{no_step, CodecError, ExiDocument, ExiElement};
use crate::exi_enum;
use crate::grammar::{
    ComplexType, DocumentGrammar, Occurs, Particle, RootElement, RootKind, SimpleType, Term,
};
use crate::value::{Enumerated, ExiArray, ExiString, FieldMut, FieldRef};

pub const NAMESPACE: &str = "urn:iso:15118:2:2010:AppProtocol";
pub const PROTOCOL_NAMESPACE_LEN: usize = 100;
pub const APP_PROTOCOL_MAX: usize = 20;

exi_enum! {
    pub enum ResponseCode {
        OkSuccessfulNegotiation = "OK_SuccessfulNegotiation",
        OkSuccessfulNegotiationWithMinorDeviation = "OK_SuccessfulNegotiationWithMinorDeviation",
        FailedNoNegotiation = "Failed_NoNegotiation",
    }
}

static APP_PROTOCOL_TYPE: ComplexType = ComplexType {
    name: "AppProtocolType",
    attributes: &[],
    particles: &[
        Particle::one(
            "ProtocolNamespace",
            Term::Simple(SimpleType::string(PROTOCOL_NAMESPACE_LEN)),
        ),
        Particle::one("VersionNumberMajor", Term::Simple(SimpleType::UNSIGNED_INT)),
        Particle::one("VersionNumberMinor", Term::Simple(SimpleType::UNSIGNED_INT)),
        Particle::one("SchemaID", Term::Simple(SimpleType::UNSIGNED_BYTE)),
        Particle::one("Priority", Term::Simple(SimpleType::ranged(1, 20))),
    ],
    mixed: false,
};

static SUPPORTED_APP_PROTOCOL_REQ: ComplexType = ComplexType {
    name: "supportedAppProtocolReq",
    attributes: &[],
    particles: &[Particle::new(
        "AppProtocol",
        Term::Complex(&APP_PROTOCOL_TYPE),
        Occurs::range(1, APP_PROTOCOL_MAX as u32),
    )],
    mixed: false,
};

static SUPPORTED_APP_PROTOCOL_RES: ComplexType = ComplexType {
    name: "supportedAppProtocolRes",
    attributes: &[],
    particles: &[
        Particle::one(
            "ResponseCode",
            Term::Simple(SimpleType::Enumeration(ResponseCode::NAMES)),
        ),
        Particle::optional("SchemaID", Term::Simple(SimpleType::UNSIGNED_BYTE)),
    ],
    mixed: false,
};

pub static GRAMMAR: DocumentGrammar = DocumentGrammar {
    name: "AppProtocol",
    namespace: NAMESPACE,
    kind: RootKind::Document,
    roots: &[
        RootElement::modelled("supportedAppProtocolReq", &SUPPORTED_APP_PROTOCOL_REQ),
        RootElement::modelled("supportedAppProtocolRes", &SUPPORTED_APP_PROTOCOL_RES),
    ],
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppProtocol {
    pub protocol_namespace: ExiString<PROTOCOL_NAMESPACE_LEN>,
    pub version_number_major: u32,
    pub version_number_minor: u32,
    pub schema_id: u8,
    pub priority: u8,
}

impl AppProtocol {
    pub fn new(
        namespace: &str,
        major: u32,
        minor: u32,
        schema_id: u8,
        priority: u8,
    ) -> Result<Self, CodecError> {
        Ok(AppProtocol {
            protocol_namespace: ExiString::try_from(namespace)?,
            version_number_major: major,
            version_number_minor: minor,
            schema_id,
            priority,
        })
    }
}

impl ExiElement for AppProtocol {
    fn occurrences(&self, step: usize) -> usize {
        if step < 5 {
            1
        } else {
            0
        }
    }

    fn field(&self, step: usize, _occurrence: usize) -> FieldRef<'_> {
        match step {
            0 => FieldRef::Chars(self.protocol_namespace.as_str()),
            1 => FieldRef::Unsigned(self.version_number_major.into()),
            2 => FieldRef::Unsigned(self.version_number_minor.into()),
            3 => FieldRef::Unsigned(self.schema_id.into()),
            4 => FieldRef::Unsigned(self.priority.into()),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, _occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        Ok(match step {
            0 => FieldMut::Chars(&mut self.protocol_namespace),
            1 => FieldMut::U32(&mut self.version_number_major),
            2 => FieldMut::U32(&mut self.version_number_minor),
            3 => FieldMut::U8(&mut self.schema_id),
            4 => FieldMut::U8(&mut self.priority),
            _ => return Err(no_step("AppProtocolType", step)),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupportedAppProtocolReq {
    pub app_protocol: ExiArray<AppProtocol, APP_PROTOCOL_MAX>,
}

impl ExiElement for SupportedAppProtocolReq {
    fn occurrences(&self, step: usize) -> usize {
        match step {
            0 => self.app_protocol.len(),
            _ => 0,
        }
    }

    fn field(&self, step: usize, occurrence: usize) -> FieldRef<'_> {
        match (step, self.app_protocol.get(occurrence)) {
            (0, Some(p)) => FieldRef::Element(p),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        match step {
            0 => Ok(FieldMut::Element(self.app_protocol.slot(occurrence)?)),
            _ => Err(no_step("supportedAppProtocolReq", step)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupportedAppProtocolRes {
    pub response_code: ResponseCode,
    pub schema_id: Option<u8>,
}

impl ExiElement for SupportedAppProtocolRes {
    fn occurrences(&self, step: usize) -> usize {
        match step {
            0 => 1,
            1 => self.schema_id.is_some() as usize,
            _ => 0,
        }
    }

    fn field(&self, step: usize, _occurrence: usize) -> FieldRef<'_> {
        match (step, self.schema_id) {
            (0, _) => FieldRef::Enum(self.response_code.index()),
            (1, Some(id)) => FieldRef::Unsigned(id.into()),
            _ => FieldRef::Absent,
        }
    }

    fn slot(&mut self, step: usize, _occurrence: usize) -> Result<FieldMut<'_>, CodecError> {
        match step {
            0 => Ok(FieldMut::Enum(&mut self.response_code)),
            1 => Ok(FieldMut::U8(self.schema_id.get_or_insert(0))),
            _ => Err(no_step("supportedAppProtocolRes", step)),
        }
    }
}

/// A SupportedAppProtocol document.
#[derive(Debug, Clone, PartialEq)]
pub enum AppHandDocument {
    SupportedAppProtocolReq(SupportedAppProtocolReq),
    SupportedAppProtocolRes(SupportedAppProtocolRes),
}

impl ExiDocument for AppHandDocument {
    fn grammar() -> &'static DocumentGrammar {
        &GRAMMAR
    }

    fn root_name(&self) -> &'static str {
        match self {
            AppHandDocument::SupportedAppProtocolReq(_) => "supportedAppProtocolReq",
            AppHandDocument::SupportedAppProtocolRes(_) => "supportedAppProtocolRes",
        }
    }

    fn root(&self) -> &dyn ExiElement {
        match self {
            AppHandDocument::SupportedAppProtocolReq(m) => m,
            AppHandDocument::SupportedAppProtocolRes(m) => m,
        }
    }

    fn root_mut(&mut self) -> &mut dyn ExiElement {
        match self {
            AppHandDocument::SupportedAppProtocolReq(m) => m,
            AppHandDocument::SupportedAppProtocolRes(m) => m,
        }
    }

    fn with_root(name: &str) -> Option<Self> {
        match name {
            "supportedAppProtocolReq" => Some(AppHandDocument::SupportedAppProtocolReq(
                SupportedAppProtocolReq::default(),
            )),
            "supportedAppProtocolRes" => Some(AppHandDocument::SupportedAppProtocolRes(
                SupportedAppProtocolRes::default(),
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarState;

    #[test]
    fn response_without_schema_id() {
        let doc = AppHandDocument::SupportedAppProtocolRes(SupportedAppProtocolRes {
            response_code: ResponseCode::FailedNoNegotiation,
            schema_id: None,
        });
        let mut buf = [0u8; 8];
        let n = crate::codec::encode_document(&doc, &mut buf, 0).unwrap();
        // root 01, ResponseCode 0, CH 0, enum 10, EE 0, then EE as 01
        assert_eq!(&buf[..n], &[0x80, 0x48, 0x80]);
    }

    #[test]
    fn app_protocol_stops_repeating_at_twenty() {
        let mut s = GrammarState::start(&SUPPORTED_APP_PROTOCOL_REQ);
        for _ in 0..APP_PROTOCOL_MAX {
            s.advance(0);
        }
        assert_eq!(s.width(), 1);
        assert_eq!(s.code_of(crate::grammar::Event::EndElement), Some(0));
    }
}
