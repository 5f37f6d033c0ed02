//! File-sharing protocol plugins: NFS (v3 and v4) and SMB2.

use pcapai_core::raw::{first_scalar_string, parse_int};
use pcapai_core::{FieldMap, FieldValue, RawLayer};
use serde_json::Value;

use super::OPERATION_FIELD;
use crate::plugin::{code_name, Promoter, ProtocolPlugin};

const NFS3_PROCEDURES: &[(i64, &str)] = &[
    (0, "NULL"),
    (1, "GETATTR"),
    (2, "SETATTR"),
    (3, "LOOKUP"),
    (4, "ACCESS"),
    (5, "READLINK"),
    (6, "READ"),
    (7, "WRITE"),
    (8, "CREATE"),
    (9, "MKDIR"),
    (10, "SYMLINK"),
    (11, "MKNOD"),
    (12, "REMOVE"),
    (13, "RMDIR"),
    (14, "RENAME"),
    (15, "LINK"),
    (16, "READDIR"),
    (17, "READDIRPLUS"),
    (18, "FSSTAT"),
    (19, "FSINFO"),
    (20, "PATHCONF"),
    (21, "COMMIT"),
];

const NFS4_PROCEDURES: &[(i64, &str)] = &[(0, "NULL"), (1, "COMPOUND")];

const NFS4_OPERATIONS: &[(i64, &str)] = &[
    (3, "ACCESS"),
    (4, "CLOSE"),
    (5, "COMMIT"),
    (6, "CREATE"),
    (7, "DELEGPURGE"),
    (8, "DELEGRETURN"),
    (9, "GETATTR"),
    (10, "GETFH"),
    (11, "LINK"),
    (12, "LOCK"),
    (13, "LOCKT"),
    (14, "LOCKU"),
    (15, "LOOKUP"),
    (16, "LOOKUPP"),
    (17, "NVERIFY"),
    (18, "OPEN"),
    (19, "OPENATTR"),
    (20, "OPEN_CONFIRM"),
    (21, "OPEN_DOWNGRADE"),
    (22, "PUTFH"),
    (23, "PUTPUBFH"),
    (24, "PUTROOTFH"),
    (25, "READ"),
    (26, "READDIR"),
    (27, "READLINK"),
    (28, "REMOVE"),
    (29, "RENAME"),
    (30, "RENEW"),
    (31, "RESTOREFH"),
    (32, "SAVEFH"),
    (33, "SECINFO"),
    (34, "SETATTR"),
    (35, "SETCLIENTID"),
    (36, "SETCLIENTID_CONFIRM"),
    (37, "VERIFY"),
    (38, "WRITE"),
    (39, "RELEASE_LOCKOWNER"),
    (40, "BACKCHANNEL_CTL"),
    (41, "BIND_CONN_TO_SESSION"),
    (42, "EXCHANGE_ID"),
    (43, "CREATE_SESSION"),
    (44, "DESTROY_SESSION"),
    (45, "FREE_STATEID"),
    (46, "GET_DIR_DELEGATION"),
    (47, "GETDEVICEINFO"),
    (48, "GETDEVICELIST"),
    (49, "LAYOUTCOMMIT"),
    (50, "LAYOUTGET"),
    (51, "LAYOUTRETURN"),
    (52, "SECINFO_NO_NAME"),
    (53, "SEQUENCE"),
    (54, "SET_SSV"),
    (55, "TEST_STATEID"),
    (56, "WANT_DELEGATION"),
    (57, "DESTROY_CLIENTID"),
    (58, "RECLAIM_COMPLETE"),
];

/// Network File System.
///
/// For v3 the operation is the procedure name. For a v4 COMPOUND it is the
/// list of operation names carried by the call, so `byOperation` matches a
/// compound containing the requested operation anywhere in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NfsPlugin;

impl NfsPlugin {
    fn v4_operations(layer: &RawLayer) -> Vec<FieldValue> {
        let codes: Vec<i64> = match layer.get("nfs.opcode") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(first_scalar_string)
                .filter_map(|s| parse_int(&s))
                .collect(),
            Some(other) => first_scalar_string(other)
                .and_then(|s| parse_int(&s))
                .into_iter()
                .collect(),
            None => Vec::new(),
        };
        codes
            .into_iter()
            .filter_map(|code| code_name(NFS4_OPERATIONS, code))
            .map(FieldValue::from)
            .collect()
    }
}

impl ProtocolPlugin for NfsPlugin {
    fn name(&self) -> &'static str {
        "nfs"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["nfs"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        if let Some(code) = layer.get_i64("nfs.procedure_v3") {
            let procedure = code_name(NFS3_PROCEDURES, code).map(FieldValue::from);
            return Promoter::new(layer)
                .value("version", Some(FieldValue::Int(3)))
                .value("procedure", procedure.clone())
                .text("file_handle", "nfs.fh.hash")
                .text("name", "nfs.name")
                .int("status", "nfs.nfsstat3")
                .int("offset", "nfs.offset3")
                .int("count", "nfs.count3")
                .value(OPERATION_FIELD, procedure)
                .finish();
        }

        let procedure = layer
            .get_i64("nfs.procedure_v4")
            .and_then(|code| code_name(NFS4_PROCEDURES, code));
        let operations = Self::v4_operations(layer);
        let operation = if !operations.is_empty() {
            Some(FieldValue::List(operations))
        } else {
            procedure.map(FieldValue::from)
        };
        let version = layer.get("nfs.procedure_v4").map(|_| FieldValue::Int(4));
        Promoter::new(layer)
            .value("version", version)
            .value("procedure", procedure.map(FieldValue::from))
            .text("file_handle", "nfs.fh.hash")
            .text("name", "nfs.name")
            .text("tag", "nfs.tag")
            .int("status", "nfs.nfsstat4")
            .int("offset", "nfs.offset4")
            .int("count", "nfs.count4")
            .value(OPERATION_FIELD, operation)
            .finish()
    }
}

const SMB2_COMMANDS: &[(i64, &str)] = &[
    (0, "NEGOTIATE"),
    (1, "SESSION_SETUP"),
    (2, "LOGOFF"),
    (3, "TREE_CONNECT"),
    (4, "TREE_DISCONNECT"),
    (5, "CREATE"),
    (6, "CLOSE"),
    (7, "FLUSH"),
    (8, "READ"),
    (9, "WRITE"),
    (10, "LOCK"),
    (11, "IOCTL"),
    (12, "CANCEL"),
    (13, "ECHO"),
    (14, "QUERY_DIRECTORY"),
    (15, "CHANGE_NOTIFY"),
    (16, "QUERY_INFO"),
    (17, "SET_INFO"),
    (18, "OPLOCK_BREAK"),
];

/// Server Message Block version 2/3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Smb2Plugin;

impl ProtocolPlugin for Smb2Plugin {
    fn name(&self) -> &'static str {
        "smb2"
    }

    fn layer_names(&self) -> &'static [&'static str] {
        &["smb2"]
    }

    fn extract(&self, layer: &RawLayer) -> FieldMap {
        let command = layer
            .get_i64("smb2.cmd")
            .and_then(|code| code_name(SMB2_COMMANDS, code))
            .map(FieldValue::from);
        Promoter::new(layer)
            .int("command_code", "smb2.cmd")
            .value("command", command.clone())
            .flag("response", "smb2.flags.response")
            .text("nt_status", "smb2.nt_status")
            .text("session_id", "smb2.sesid")
            .int("tree_id", "smb2.tid")
            .int("message_id", "smb2.msg_id")
            .text("filename", "smb2.filename")
            .text("tree", "smb2.tree")
            .value(OPERATION_FIELD, command)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nfs3_procedure_name() {
        let layer = RawLayer::new("nfs")
            .with_field("nfs.procedure_v3", "6")
            .with_field("nfs.count3", "4096")
            .with_field("nfs.offset3", "0");
        let fields = NfsPlugin.extract(&layer);
        assert_eq!(fields.get(OPERATION_FIELD), Some(&"READ".into()));
        assert_eq!(fields.get("version"), Some(&FieldValue::Int(3)));
        assert_eq!(fields.get("count"), Some(&FieldValue::Int(4096)));
    }

    #[test]
    fn test_nfs4_compound_operations() {
        let layer = RawLayer::new("nfs")
            .with_field("nfs.procedure_v4", "1")
            .with_field("nfs.opcode", json!(["53", "22", "25"]));
        let fields = NfsPlugin.extract(&layer);
        let op = fields.get(OPERATION_FIELD).unwrap();
        assert!(op.matches_text("read"));
        assert!(op.matches_text("PUTFH"));
        assert!(!op.matches_text("WRITE"));
        assert_eq!(fields.get("procedure"), Some(&"COMPOUND".into()));
        assert_eq!(fields.get("version"), Some(&FieldValue::Int(4)));
    }

    #[test]
    fn test_nfs4_null_procedure() {
        let layer = RawLayer::new("nfs").with_field("nfs.procedure_v4", "0");
        let fields = NfsPlugin.extract(&layer);
        assert_eq!(fields.get(OPERATION_FIELD), Some(&"NULL".into()));
    }

    #[test]
    fn test_smb2_command_name() {
        let layer = RawLayer::new("smb2")
            .with_field("smb2.cmd", "5")
            .with_field("smb2.flags.response", "1")
            .with_field("smb2.filename", "report.docx");
        let fields = Smb2Plugin.extract(&layer);
        assert_eq!(fields.get(OPERATION_FIELD), Some(&"CREATE".into()));
        assert_eq!(fields.get("command_code"), Some(&FieldValue::Int(5)));
        assert_eq!(fields.get("response"), Some(&FieldValue::Bool(true)));
        assert_eq!(fields.get("filename"), Some(&"report.docx".into()));
    }
}
