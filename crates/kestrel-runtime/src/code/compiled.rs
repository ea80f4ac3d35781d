//! Compiled methods and their scope debug info
//!
//! Each call site in compiled code has a [`PcDesc`] pointing into the scope
//! stream. A scope record is `(sender_offset, metadata_index, bci)`; following
//! `sender_offset` walks from the most-inlined method out to the physical
//! method. Offset 0 is the serialized null and terminates the chain, so the
//! stream begins with one padding byte.

use super::stream::{CompressedReadStream, CompressedWriteStream, DebugInfoError};
use crate::oops::Method;
use std::fmt;
use std::sync::Arc;

/// Serialized null scope offset
pub const NULL_SCOPE: u32 = 0;

/// Maps a code offset to the scope chain active there
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcDesc {
    pub pc_offset: u32,
    pub scope_decode_offset: u32,
}

/// One decoded scope
#[derive(Debug, Clone)]
pub struct ScopeDesc {
    pub method: Arc<Method>,
    pub bci: i32,
    /// Offset of the caller's scope, [`NULL_SCOPE`] for the physical method
    pub sender_offset: u32,
}

impl ScopeDesc {
    pub fn is_top(&self) -> bool {
        self.sender_offset == NULL_SCOPE
    }
}

/// Machine code produced for one method
pub struct CompiledMethod {
    method: Arc<Method>,
    native_wrapper: bool,
    metadata: Box<[Arc<Method>]>,
    pc_descs: Box<[PcDesc]>,
    scopes: Box<[u8]>,
}

impl CompiledMethod {
    /// Wrapper through which compiled code calls a native method
    pub fn native_wrapper(method: Arc<Method>) -> Arc<Self> {
        Arc::new(Self {
            method,
            native_wrapper: true,
            metadata: Box::default(),
            pc_descs: Box::default(),
            scopes: Box::default(),
        })
    }

    pub fn builder(method: Arc<Method>) -> CompiledMethodBuilder {
        CompiledMethodBuilder::new(method)
    }

    /// The physical (outermost) method
    pub fn method(&self) -> &Arc<Method> {
        &self.method
    }

    pub fn is_native_wrapper(&self) -> bool {
        self.native_wrapper
    }

    pub fn pc_descs(&self) -> &[PcDesc] {
        &self.pc_descs
    }

    /// Descriptor recorded for exactly `pc_offset`
    pub fn pc_desc_at(&self, pc_offset: u32) -> Option<&PcDesc> {
        self.pc_descs
            .binary_search_by_key(&pc_offset, |desc| desc.pc_offset)
            .ok()
            .map(|index| &self.pc_descs[index])
    }

    /// Decode the scope record at `offset`
    pub fn scope_at(&self, offset: u32) -> Result<ScopeDesc, DebugInfoError> {
        if offset == NULL_SCOPE || offset as usize >= self.scopes.len() {
            return Err(DebugInfoError::BadScopeOffset {
                offset,
                len: self.scopes.len(),
            });
        }

        let mut stream = CompressedReadStream::new(&self.scopes, offset as usize);
        let sender_offset = stream.read_int()?;
        let index = stream.read_int()?;
        let method = self
            .metadata
            .get(index as usize)
            .cloned()
            .ok_or(DebugInfoError::BadMetadataIndex {
                index,
                len: self.metadata.len(),
            })?;
        let bci = stream.read_bci()?;

        Ok(ScopeDesc {
            method,
            bci,
            sender_offset,
        })
    }
}

impl fmt::Debug for CompiledMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledMethod")
            .field("method", &self.method.external_name())
            .field("native_wrapper", &self.native_wrapper)
            .field("pc_descs", &self.pc_descs.len())
            .finish()
    }
}

/// Records call sites while "compiling" a method
pub struct CompiledMethodBuilder {
    method: Arc<Method>,
    metadata: Vec<Arc<Method>>,
    pc_descs: Vec<PcDesc>,
    stream: CompressedWriteStream,
}

impl CompiledMethodBuilder {
    pub fn new(method: Arc<Method>) -> Self {
        let mut stream = CompressedWriteStream::new();
        // keeps offset 0 free for the null scope
        stream.write_byte(0);
        Self {
            method,
            metadata: Vec::new(),
            pc_descs: Vec::new(),
            stream,
        }
    }

    fn metadata_index(&mut self, method: &Arc<Method>) -> u32 {
        let index = match self.metadata.iter().position(|m| Arc::ptr_eq(m, method)) {
            Some(index) => index,
            None => {
                self.metadata.push(Arc::clone(method));
                self.metadata.len() - 1
            }
        };
        index as u32
    }

    /// Record a call site at `pc_offset`
    ///
    /// `scopes` lists the active methods from the physical method inward,
    /// each with the bci of its pending call. An empty list records a call
    /// site of the physical method at bci 0.
    pub fn call_site(mut self, pc_offset: u32, scopes: &[(Arc<Method>, i32)]) -> Self {
        let physical = [(Arc::clone(&self.method), 0)];
        let scopes = if scopes.is_empty() { &physical[..] } else { scopes };

        let mut sender = NULL_SCOPE;
        for (method, bci) in scopes {
            let offset = self.stream.position();
            let index = self.metadata_index(method);
            self.stream.write_int(sender);
            self.stream.write_int(index);
            self.stream.write_bci(*bci);
            sender = offset;
        }

        self.pc_descs.push(PcDesc {
            pc_offset,
            scope_decode_offset: sender,
        });
        self
    }

    pub fn build(mut self) -> Arc<CompiledMethod> {
        self.pc_descs.sort_by_key(|desc| desc.pc_offset);
        self.pc_descs.dedup_by_key(|desc| desc.pc_offset);
        Arc::new(CompiledMethod {
            method: self.method,
            native_wrapper: false,
            metadata: self.metadata.into_boxed_slice(),
            pc_descs: self.pc_descs.into_boxed_slice(),
            scopes: self.stream.into_bytes(),
        })
    }
}
