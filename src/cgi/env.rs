//! Environment handed to gateway programs.

use std::collections::BTreeMap;
use std::path::Path;

use sha2::{Digest, Sha256};
use x509_parser::prelude::{FromDer, X509Certificate, X509Name};

use crate::config::ServerIdentity;
use crate::gemini::connection::ConnectionInfo;
use crate::gemini::request::Request;

pub const GATEWAY_INTERFACE: &str = "CGI/1.1";

/// Variable name to value; built fresh for every request.
pub type Environment = BTreeMap<String, String>;

pub fn build(
    request: &Request,
    connection: &ConnectionInfo,
    identity: &ServerIdentity,
    script: &Path,
) -> Environment {
    let script = script.display().to_string();
    let mut vars = Environment::new();

    vars.insert("QUERY_STRING".into(), request.query().unwrap_or_default().into());
    vars.insert("REMOTE_ADDR".into(), connection.peer_addr.to_string());
    vars.insert("REQUEST_METHOD".into(), String::new());
    vars.insert("SERVER_NAME".into(), identity.host.clone());
    vars.insert("SERVER_PORT".into(), identity.port.clone());
    vars.insert("SERVER_PROTOCOL".into(), request.scheme.as_str().into());
    vars.insert("SERVER_SOFTWARE".into(), identity.software.clone());
    vars.insert("GATEWAY_INTERFACE".into(), GATEWAY_INTERFACE.into());
    vars.insert("SCRIPT_PATH".into(), script.clone());
    vars.insert("PATH_INFO".into(), script);

    if let Some(der) = &connection.client_certificate {
        add_client_certificate(&mut vars, der);
    }

    vars
}

/// Lowercase hex SHA-256 of a certificate's DER encoding.
pub fn certificate_fingerprint(der: &[u8]) -> String {
    hex::encode(Sha256::digest(der))
}

fn add_client_certificate(vars: &mut Environment, der: &[u8]) {
    vars.insert("TLS_CLIENT_HASH".into(), certificate_fingerprint(der));

    match X509Certificate::from_der(der) {
        Ok((_, cert)) => {
            vars.insert("TLS_CLIENT_ISSUER".into(), cert.issuer().to_string());
            vars.insert("TLS_CLIENT_ISSUER_CN".into(), common_name(cert.issuer()));
            vars.insert("TLS_CLIENT_SUBJECT".into(), cert.subject().to_string());
            vars.insert("TLS_CLIENT_SUBJECT_CN".into(), common_name(cert.subject()));
        }
        Err(e) => {
            tracing::warn!(error = %e, "client certificate could not be parsed");
        }
    }
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::request::Scheme;
    use url::Url;

    fn identity() -> ServerIdentity {
        ServerIdentity {
            host: "localhost".into(),
            port: "1965".into(),
            software: "nightjar/test".into(),
        }
    }

    fn connection(cert: Option<Vec<u8>>) -> ConnectionInfo {
        ConnectionInfo::new(
            "10.0.0.7:40000".parse().unwrap(),
            "10.0.0.1:1965".parse().unwrap(),
            cert,
        )
    }

    #[test]
    fn request_and_server_variables() {
        let url = Url::parse("nimigem://example.org/cgi-bin/post?a=1&b=2").unwrap();
        let request = Request::new(Scheme::Nimigem, url, &b"data"[..]);
        let vars = build(
            &request,
            &connection(None),
            &identity(),
            Path::new("/srv/cgi/post"),
        );

        assert_eq!(vars["QUERY_STRING"], "a=1&b=2");
        assert_eq!(vars["REMOTE_ADDR"], "10.0.0.7:40000");
        assert_eq!(vars["REQUEST_METHOD"], "");
        assert_eq!(vars["SERVER_NAME"], "localhost");
        assert_eq!(vars["SERVER_PORT"], "1965");
        assert_eq!(vars["SERVER_PROTOCOL"], "nimigem");
        assert_eq!(vars["SERVER_SOFTWARE"], "nightjar/test");
        assert_eq!(vars["GATEWAY_INTERFACE"], "CGI/1.1");
        assert_eq!(vars["SCRIPT_PATH"], "/srv/cgi/post");
        assert_eq!(vars["PATH_INFO"], "/srv/cgi/post");
        assert!(!vars.keys().any(|k| k.starts_with("TLS_")));
    }

    #[test]
    fn client_certificate_variables() {
        let mut params = rcgen::CertificateParams::new(vec!["alice.example".to_string()]).unwrap();
        params.distinguished_name = rcgen::DistinguishedName::new();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, "alice");
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        let der = cert.der().to_vec();

        let url = Url::parse("gemini://example.org/cgi-bin/me").unwrap();
        let request = Request::new(Scheme::Gemini, url, bytes::Bytes::new());
        let vars = build(
            &request,
            &connection(Some(der.clone())),
            &identity(),
            Path::new("/srv/cgi/me"),
        );

        assert_eq!(vars["QUERY_STRING"], "");
        assert_eq!(vars["TLS_CLIENT_HASH"], certificate_fingerprint(&der));
        assert_eq!(vars["TLS_CLIENT_HASH"].len(), 64);
        assert_eq!(vars["TLS_CLIENT_SUBJECT_CN"], "alice");
        assert_eq!(vars["TLS_CLIENT_ISSUER_CN"], "alice");
        assert!(vars["TLS_CLIENT_SUBJECT"].contains("CN=alice"));
        assert!(vars["TLS_CLIENT_ISSUER"].contains("CN=alice"));
    }

    #[test]
    fn unparsable_certificate_still_gets_a_hash() {
        let url = Url::parse("gemini://example.org/").unwrap();
        let request = Request::new(Scheme::Gemini, url, bytes::Bytes::new());
        let vars = build(
            &request,
            &connection(Some(b"not a certificate".to_vec())),
            &identity(),
            Path::new("/srv/cgi/x"),
        );

        assert!(vars.contains_key("TLS_CLIENT_HASH"));
        assert!(!vars.contains_key("TLS_CLIENT_SUBJECT"));
    }

    #[test]
    fn fingerprint_is_lowercase_sha256_hex() {
        assert_eq!(
            certificate_fingerprint(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
