pub use sorbus_core::signature::{
    Iter, Signature, SignatureBuf, SignatureBuilder, SignatureError, Type,
};
