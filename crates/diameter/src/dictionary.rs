//! The subset of the Diameter base protocol and 3GPP TS 29.229 dictionary
//! the gateway emits and consumes.

pub const CX_APPLICATION_ID: u32 = 16777216;
pub const VENDOR_3GPP: u32 = 10415;

// Command codes
pub const CMD_USER_AUTHORIZATION: u32 = 300;
pub const CMD_SERVER_ASSIGNMENT: u32 = 301;
pub const CMD_LOCATION_INFO: u32 = 302;
pub const CMD_MULTIMEDIA_AUTH: u32 = 303;
pub const CMD_REGISTRATION_TERMINATION: u32 = 304;
pub const CMD_PUSH_PROFILE: u32 = 305;

// Base-protocol AVPs
pub const AVP_USER_NAME: u32 = 1;
pub const AVP_AUTH_APPLICATION_ID: u32 = 258;
pub const AVP_VENDOR_SPECIFIC_APPLICATION_ID: u32 = 260;
pub const AVP_SESSION_ID: u32 = 263;
pub const AVP_ORIGIN_HOST: u32 = 264;
pub const AVP_VENDOR_ID: u32 = 266;
pub const AVP_RESULT_CODE: u32 = 268;
pub const AVP_AUTH_SESSION_STATE: u32 = 277;
pub const AVP_DESTINATION_REALM: u32 = 283;
pub const AVP_DESTINATION_HOST: u32 = 293;
pub const AVP_ORIGIN_REALM: u32 = 296;
pub const AVP_EXPERIMENTAL_RESULT: u32 = 297;
pub const AVP_EXPERIMENTAL_RESULT_CODE: u32 = 298;

// SIP digest AVPs (RFC 4590)
pub const AVP_DIGEST_REALM: u32 = 104;
pub const AVP_DIGEST_QOP: u32 = 110;
pub const AVP_DIGEST_HA1: u32 = 121;

// 3GPP Cx AVPs (vendor 10415)
pub const AVP_VISITED_NETWORK_IDENTIFIER: u32 = 600;
pub const AVP_PUBLIC_IDENTITY: u32 = 601;
pub const AVP_SERVER_NAME: u32 = 602;
pub const AVP_SERVER_CAPABILITIES: u32 = 603;
pub const AVP_MANDATORY_CAPABILITY: u32 = 604;
pub const AVP_OPTIONAL_CAPABILITY: u32 = 605;
pub const AVP_USER_DATA: u32 = 606;
pub const AVP_SIP_NUMBER_AUTH_ITEMS: u32 = 607;
pub const AVP_SIP_AUTHENTICATION_SCHEME: u32 = 608;
pub const AVP_SIP_AUTHENTICATE: u32 = 609;
pub const AVP_SIP_AUTHORIZATION: u32 = 610;
pub const AVP_SIP_AUTH_DATA_ITEM: u32 = 612;
pub const AVP_SIP_ITEM_NUMBER: u32 = 613;
pub const AVP_SERVER_ASSIGNMENT_TYPE: u32 = 614;
pub const AVP_DEREGISTRATION_REASON: u32 = 615;
pub const AVP_REASON_CODE: u32 = 616;
pub const AVP_REASON_INFO: u32 = 617;
pub const AVP_CHARGING_INFORMATION: u32 = 618;
pub const AVP_PRIMARY_EVENT_CHARGING_FUNCTION_NAME: u32 = 619;
pub const AVP_SECONDARY_EVENT_CHARGING_FUNCTION_NAME: u32 = 620;
pub const AVP_PRIMARY_CHARGING_COLLECTION_FUNCTION_NAME: u32 = 621;
pub const AVP_SECONDARY_CHARGING_COLLECTION_FUNCTION_NAME: u32 = 622;
pub const AVP_USER_AUTHORIZATION_TYPE: u32 = 623;
pub const AVP_USER_DATA_ALREADY_AVAILABLE: u32 = 624;
pub const AVP_CONFIDENTIALITY_KEY: u32 = 625;
pub const AVP_INTEGRITY_KEY: u32 = 626;
pub const AVP_ASSOCIATED_IDENTITIES: u32 = 632;
pub const AVP_WILDCARDED_PUBLIC_IDENTITY: u32 = 634;
pub const AVP_SIP_DIGEST_AUTHENTICATE: u32 = 635;

// Result codes
pub const DIAMETER_SUCCESS: u32 = 2001;
pub const DIAMETER_UNABLE_TO_DELIVER: u32 = 3002;
pub const DIAMETER_TOO_BUSY: u32 = 3004;
pub const DIAMETER_AUTHORIZATION_REJECTED: u32 = 4001;
pub const DIAMETER_UNABLE_TO_COMPLY: u32 = 5012;

// Experimental result codes (vendor 10415)
pub const ERROR_USER_UNKNOWN: u32 = 5001;
pub const ERROR_IDENTITIES_DONT_MATCH: u32 = 5002;
pub const ERROR_ROAMING_NOT_ALLOWED: u32 = 5003;
pub const ERROR_IDENTITY_NOT_REGISTERED: u32 = 5032;
pub const ERROR_IN_ASSIGNMENT_TYPE: u32 = 5065;

// Auth-Session-State
pub const NO_STATE_MAINTAINED: i32 = 1;
