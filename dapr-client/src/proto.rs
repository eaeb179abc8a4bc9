//! # Wire Types
//!
//! Protobuf messages exchanged with the Dapr sidecar, generated by `prost-build` from the
//! files under `proto/` (see the `generate-proto` binary behind the `gen-proto` feature).
//!
//! The module tree mirrors the Protobuf packages so that the cross-package references
//! emitted by the generator (`super::super::common::v1::...`) resolve as-is.
pub mod dapr {
    pub mod proto {
        pub mod common {
            pub mod v1 {
                include!("proto/generated/dapr.proto.common.v1.rs");
            }
        }

        pub mod runtime {
            pub mod v1 {
                include!("proto/generated/dapr.proto.runtime.v1.rs");

                /// Fully qualified gRPC paths of the `dapr.proto.runtime.v1.Dapr` service methods.
                pub mod paths {
                    pub const INVOKE_SERVICE: &str = "/dapr.proto.runtime.v1.Dapr/InvokeService";
                    pub const GET_STATE: &str = "/dapr.proto.runtime.v1.Dapr/GetState";
                    pub const GET_BULK_STATE: &str = "/dapr.proto.runtime.v1.Dapr/GetBulkState";
                    pub const SAVE_STATE: &str = "/dapr.proto.runtime.v1.Dapr/SaveState";
                    pub const DELETE_STATE: &str = "/dapr.proto.runtime.v1.Dapr/DeleteState";
                    pub const EXECUTE_STATE_TRANSACTION: &str =
                        "/dapr.proto.runtime.v1.Dapr/ExecuteStateTransaction";
                    pub const PUBLISH_EVENT: &str = "/dapr.proto.runtime.v1.Dapr/PublishEvent";
                    pub const INVOKE_BINDING: &str = "/dapr.proto.runtime.v1.Dapr/InvokeBinding";
                    pub const GET_SECRET: &str = "/dapr.proto.runtime.v1.Dapr/GetSecret";
                }
            }
        }
    }
}

pub mod google {
    pub mod rpc {
        include!("proto/generated/google.rpc.rs");

        /// Type URL under which an [`ErrorInfo`] is packed inside a [`Status`] detail.
        pub const ERROR_INFO_TYPE_URL: &str = "type.googleapis.com/google.rpc.ErrorInfo";
    }
}
