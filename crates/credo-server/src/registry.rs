//! # Scheme Registry
//!
//! Read-only lookup of scheme metadata and issuer key material. Built once
//! at startup (the disk loader parsing scheme material is an external
//! collaborator) and shared immutably; readers take no lock.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use credo_core::{
    AttributeTypeId, CredentialTypeId, CredentialTypeInfo, IssuerId, SchemeId, SchemeInfo,
};
use credo_crypto::{PrivateKey, PublicKey, RevocationPrivateKey, RevocationPublicKey};
use credo_protocol::attributes::credtype_hash;

/// Lookup failures against the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The identifier is not known to any loaded scheme.
    #[error("unknown identifier {0}")]
    UnknownIdentifier(String),
}

/// The read-only scheme registry.
#[derive(Default)]
pub struct SchemeRegistry {
    schemes: HashMap<SchemeId, SchemeInfo>,
    credential_types: HashMap<CredentialTypeId, CredentialTypeInfo>,
    credtype_by_hash: HashMap<[u8; 16], CredentialTypeId>,
    public_keys: HashMap<(IssuerId, u32), Arc<PublicKey>>,
    private_keys: HashMap<IssuerId, Arc<PrivateKey>>,
}

impl SchemeRegistry {
    /// Start building a registry.
    pub fn builder() -> SchemeRegistryBuilder {
        SchemeRegistryBuilder {
            registry: SchemeRegistry::default(),
        }
    }

    /// The public key `issuer` signs under at rollover `counter`.
    pub fn public_key(
        &self,
        issuer: &IssuerId,
        counter: u32,
    ) -> Result<Arc<PublicKey>, RegistryError> {
        self.public_keys
            .get(&(issuer.clone(), counter))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownIdentifier(format!("{issuer}#{counter}")))
    }

    /// The private key of a local issuer.
    pub fn private_key(&self, issuer: &IssuerId) -> Result<Arc<PrivateKey>, RegistryError> {
        self.private_keys
            .get(issuer)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownIdentifier(issuer.to_string()))
    }

    /// Credential type metadata.
    pub fn credential_type(
        &self,
        id: &CredentialTypeId,
    ) -> Result<&CredentialTypeInfo, RegistryError> {
        self.credential_types
            .get(id)
            .ok_or_else(|| RegistryError::UnknownIdentifier(id.to_string()))
    }

    /// Credential type by the truncated hash carried in metadata
    /// attributes.
    pub fn credential_type_by_hash(
        &self,
        hash: &[u8; 16],
    ) -> Result<&CredentialTypeInfo, RegistryError> {
        let id = self
            .credtype_by_hash
            .get(hash)
            .ok_or_else(|| RegistryError::UnknownIdentifier("credential type hash".to_string()))?;
        self.credential_type(id)
    }

    /// Check an attribute type exists.
    pub fn attribute_type(&self, id: &AttributeTypeId) -> Result<(), RegistryError> {
        let info = self.credential_type(&id.credential_type())?;
        if info.attributes.iter().any(|a| a == id.name()) {
            Ok(())
        } else {
            Err(RegistryError::UnknownIdentifier(id.to_string()))
        }
    }

    /// Whether wallets of `scheme` co-sign with a keyshare server.
    pub fn is_distributed(&self, scheme: &SchemeId) -> Result<bool, RegistryError> {
        self.schemes
            .get(scheme)
            .map(|s| s.distributed)
            .ok_or_else(|| RegistryError::UnknownIdentifier(scheme.to_string()))
    }

    /// Whether `credtype` carries a non-revocation attribute.
    pub fn supports_revocation(&self, credtype: &CredentialTypeId) -> Result<bool, RegistryError> {
        Ok(self.credential_type(credtype)?.supports_revocation)
    }

    /// The issuer's revocation public key.
    pub fn revocation_public_key(
        &self,
        issuer: &IssuerId,
    ) -> Result<RevocationPublicKey, RegistryError> {
        Ok(self.public_key(issuer, 0)?.revocation_key())
    }

    /// The issuer's revocation private key, derived from its signing key.
    pub fn revocation_private_key(
        &self,
        issuer: &IssuerId,
    ) -> Result<RevocationPrivateKey, RegistryError> {
        Ok(self.private_key(issuer)?.revocation_key())
    }
}

/// Builder assembling a registry at startup.
pub struct SchemeRegistryBuilder {
    registry: SchemeRegistry,
}

impl SchemeRegistryBuilder {
    /// Register a scheme.
    pub fn scheme(mut self, info: SchemeInfo) -> Self {
        self.registry.schemes.insert(info.id.clone(), info);
        self
    }

    /// Register an issuer's public key at its rollover counter.
    pub fn issuer_public_key(mut self, issuer: IssuerId, key: PublicKey) -> Self {
        self.registry
            .public_keys
            .insert((issuer, key.counter), Arc::new(key));
        self
    }

    /// Register a local issuer's private key.
    pub fn issuer_private_key(mut self, issuer: IssuerId, key: PrivateKey) -> Self {
        self.registry.private_keys.insert(issuer, Arc::new(key));
        self
    }

    /// Register a credential type.
    pub fn credential_type(mut self, info: CredentialTypeInfo) -> Self {
        self.registry
            .credtype_by_hash
            .insert(credtype_hash(&info.id), info.id.clone());
        self.registry.credential_types.insert(info.id.clone(), info);
        self
    }

    /// Finish the registry.
    pub fn build(self) -> SchemeRegistry {
        self.registry
    }
}
