//! JVM bytecode typing pass stuff.

mod forward;
mod types;

pub mod errors;

pub use types::{
    ArrayKind, Reference, TypeState, JAVA_LANG_CLASS, JAVA_LANG_OBJECT, JAVA_LANG_STRING,
    JAVA_LANG_THROWABLE,
};

use crate::classpath::ClassPath;
use crate::controlflow::Cfg;
use crate::dataflow;
use crate::dataflow::Dataflow;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::typing::errors::TypeError;
use cw_classfile::classes::ClassFile;
use cw_classfile::code::Code;
use cw_classfile::descriptors::MethodDescriptor;
use cw_classfile::methods::MethodInfo;
use cw_classfile::Addr;
use std::fmt;

/// Result of the typing pass.
///
/// Contains abstract frames at entries and exits of every reachable basic
/// block of the analyzed method.
pub type Types = Dataflow<Frame>;

impl Types {
    /// Runs a forward typechecking pass onto given control flow graph, and
    /// returns results of the dataflow analysis.
    ///
    /// # Errors
    ///
    /// This function may generate errors, mainly due to typecheck error (bad
    /// operand types, incompatible frames at a join, etc.), but also when
    /// classes needed to join reference types cannot be loaded.
    pub fn forward_compute(cfg: &Cfg, context: &MethodContext) -> AnalysisResult<Self> {
        dataflow::forward(cfg, context)
    }

    /// Checks that these results cannot be refined anymore.
    ///
    /// # Errors
    ///
    /// Same as [`Types::forward_compute`].
    pub fn is_fixpoint(&self, cfg: &Cfg, context: &MethodContext) -> AnalysisResult<bool> {
        dataflow::is_stable(cfg, self, context)
    }
}

/// Everything the typing pass needs to know about the analyzed method.
pub struct MethodContext<'c> {
    pub class: &'c ClassFile,
    pub method: &'c MethodInfo,
    pub code: &'c Code,
    pub descriptor: MethodDescriptor,
    pub classpath: &'c ClassPath,
    pub class_name: String,
    pub method_name: String,
}

impl<'c> MethodContext<'c> {
    /// Gathers the context of a method with code.
    ///
    /// # Errors
    ///
    /// Fails when the method has no code, or when its name or descriptor
    /// cannot be resolved.
    pub fn new(
        class: &'c ClassFile,
        method: &'c MethodInfo,
        classpath: &'c ClassPath,
    ) -> AnalysisResult<Self> {
        let pool = class.constant_pool();
        let code = method.code().ok_or(AnalysisError::NoCode)?;
        Ok(Self {
            class,
            method,
            code,
            descriptor: method.parsed_descriptor(pool)?,
            classpath,
            class_name: class.name()?,
            method_name: method.name(pool)?,
        })
    }
}

/// The abstract state for the typing pass: abstract types of the operand
/// stack words (bottom first) and of the local variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    stack: Vec<TypeState>,
    locals: Vec<TypeState>,
    max_stack: usize,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "stack: [")?;
        for (i, t) in self.stack.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        writeln!(f, "]")?;
        write!(f, "locals:")?;
        for (i, t) in self.locals.iter().enumerate() {
            write!(f, " {i}={t}")?;
        }
        Ok(())
    }
}

impl Frame {
    /// Builds the frame at method entry: `this` (for instance methods) then
    /// the parameters in the first locals, an empty stack.
    ///
    /// # Errors
    ///
    /// Fails when the parameters do not fit in `max_locals`.
    pub fn at_entry(context: &MethodContext) -> AnalysisResult<Self> {
        let max_locals = context.code.max_locals();
        // max_locals already counts `this` and every parameter word
        let mut locals = vec![TypeState::Uninitialized; max_locals];
        let mut index = 0;
        let receiver = (!context.method.is_static()).then(|| TypeState::object(&context.class_name));
        let params = context.descriptor.params().flat_map(TypeState::words_of);
        for word in receiver.into_iter().chain(params) {
            let slot = locals
                .get_mut(index)
                .ok_or_else(|| TypeError::LocalOutOfBounds {
                    pc: Addr::entry(),
                    op: "<entry>".to_string(),
                    index,
                    max: max_locals,
                })?;
            *slot = word;
            index += 1;
        }
        Ok(Self {
            stack: Vec::new(),
            locals,
            max_stack: context.code.max_stack(),
        })
    }

    #[inline]
    #[must_use]
    pub fn stack(&self) -> &[TypeState] {
        &self.stack
    }

    #[inline]
    #[must_use]
    pub fn locals(&self) -> &[TypeState] {
        &self.locals
    }

    /// Joins `other` into this frame at the block starting at `at`.
    ///
    /// Stack heights must agree and stack words must merge to something
    /// better than `Top`; locals may become unusable. Returns `true` when
    /// this frame changed.
    ///
    /// # Errors
    ///
    /// Fails on incompatible stacks, or when the class path cannot answer a
    /// common superclass query.
    pub fn join_at(&mut self, other: &Self, at: Addr, classpath: &ClassPath) -> AnalysisResult<bool> {
        if self.stack.len() != other.stack.len() {
            return Err(TypeError::StackHeightMismatch {
                pc: at,
                left: self.stack.len(),
                right: other.stack.len(),
            }
            .into());
        }
        let mut changed = false;
        for (slot, (t1, t2)) in self.stack.iter_mut().zip(&other.stack).enumerate() {
            let merged = t1.merge(t2, at, classpath)?;
            if merged == TypeState::Top {
                return Err(TypeError::StackMismatch {
                    pc: at,
                    slot,
                    left: t1.to_string(),
                    right: t2.to_string(),
                }
                .into());
            }
            if &merged != t1 {
                *t1 = merged;
                changed = true;
            }
        }
        for (t1, t2) in self.locals.iter_mut().zip(&other.locals) {
            let merged = t1.merge(t2, at, classpath)?;
            if &merged != t1 {
                *t1 = merged;
                changed = true;
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_classfile::testing::ClassBuilder;

    #[test]
    fn entry_frames() {
        let mut builder = ClassBuilder::new("t/Entry");
        builder.method_with_code(0x0001, "inst", "(JLjava/lang/String;)V", 1, 4, &[0xb1], &[]);
        builder.method_with_code(0x0009, "stat", "([IF)V", 1, 3, &[0xb1], &[]);
        builder.method_with_code(0x0009, "tight", "(DD)V", 1, 3, &[0xb1], &[]);
        let class = builder.parse().unwrap();
        let classpath = ClassPath::default();
        let mut methods = class.iter_methods();

        let inst = methods.next().unwrap();
        let frame = Frame::at_entry(&MethodContext::new(&class, inst, &classpath).unwrap()).unwrap();
        assert_eq!(
            vec![
                TypeState::object("t/Entry"),
                TypeState::Long,
                TypeState::Long2,
                TypeState::object("java/lang/String"),
            ],
            frame.locals()
        );

        let stat = methods.next().unwrap();
        let frame = Frame::at_entry(&MethodContext::new(&class, stat, &classpath).unwrap()).unwrap();
        assert_eq!(
            vec![
                TypeState::array(ArrayKind::Of(TypeState::Integer)),
                TypeState::Float,
                TypeState::Uninitialized,
            ],
            frame.locals()
        );
        assert_eq!(stat.code().unwrap().max_locals(), frame.locals().len());
        assert!(frame.stack().is_empty());

        let tight = methods.next().unwrap();
        assert!(Frame::at_entry(&MethodContext::new(&class, tight, &classpath).unwrap()).is_err());
    }
}
