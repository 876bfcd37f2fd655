//! Embedded core attribute-type definitions.
//!
//! This module provides the well-known directory attribute types embedded
//! as a static JSON string, eliminating the need for external schema files
//! for basic write-path operation. Deployments with site-specific schema
//! load additional definitions through `SchemaRegistry::from_schema_dir`.

/// Returns the core attribute-type definitions as a JSON string.
///
/// Covers the RFC 4519 user attributes the write path is commonly asked to
/// modify, the RFC 4512 operational attributes it maintains itself, and the
/// directory-specific principal-name and security-descriptor attributes.
pub fn core_attribute_types() -> &'static str {
    r#"[
  {
    "name": "objectClass",
    "matchingRule": "caseIgnore"
  },
  {
    "name": "cn",
    "matchingRule": "caseIgnore"
  },
  {
    "name": "sn",
    "matchingRule": "caseIgnore"
  },
  {
    "name": "ou",
    "matchingRule": "caseIgnore"
  },
  {
    "name": "dc",
    "matchingRule": "caseIgnore",
    "singleValued": true
  },
  {
    "name": "uid",
    "matchingRule": "caseIgnore"
  },
  {
    "name": "name",
    "matchingRule": "caseIgnore",
    "singleValued": true
  },
  {
    "name": "displayName",
    "matchingRule": "caseIgnore",
    "singleValued": true
  },
  {
    "name": "description",
    "matchingRule": "caseIgnore"
  },
  {
    "name": "mail",
    "matchingRule": "caseIgnore"
  },
  {
    "name": "telephoneNumber",
    "matchingRule": "caseIgnore"
  },
  {
    "name": "userPassword",
    "matchingRule": "octetString"
  },
  {
    "name": "jpegPhoto",
    "matchingRule": "octetString"
  },
  {
    "name": "employeeNumber",
    "matchingRule": "integer",
    "singleValued": true
  },
  {
    "name": "member",
    "matchingRule": "distinguishedName"
  },
  {
    "name": "uniqueMember",
    "matchingRule": "distinguishedName"
  },
  {
    "name": "seeAlso",
    "matchingRule": "distinguishedName"
  },
  {
    "name": "memberOf",
    "matchingRule": "distinguishedName",
    "userModifiable": false,
    "operational": true
  },
  {
    "name": "distinguishedName",
    "matchingRule": "distinguishedName",
    "singleValued": true
  },
  {
    "name": "userPrincipalName",
    "matchingRule": "caseIgnore",
    "singleValued": true
  },
  {
    "name": "nTSecurityDescriptor",
    "matchingRule": "octetString",
    "singleValued": true
  },
  {
    "name": "createTimestamp",
    "matchingRule": "generalizedTime",
    "singleValued": true,
    "userModifiable": false,
    "operational": true
  },
  {
    "name": "modifyTimestamp",
    "matchingRule": "generalizedTime",
    "singleValued": true,
    "userModifiable": false,
    "operational": true
  },
  {
    "name": "creatorsName",
    "matchingRule": "distinguishedName",
    "singleValued": true,
    "userModifiable": false,
    "operational": true
  },
  {
    "name": "modifiersName",
    "matchingRule": "distinguishedName",
    "singleValued": true,
    "userModifiable": false,
    "operational": true
  },
  {
    "name": "entryUUID",
    "matchingRule": "caseExact",
    "singleValued": true,
    "userModifiable": false,
    "operational": true
  }
]"#
}
