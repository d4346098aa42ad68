use crate::controlflow::Branch;
use crate::dataflow::AbstractForwardState;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::typing::errors::TypeError;
use crate::typing::types::{
    ArrayKind, TypeState, JAVA_LANG_CLASS, JAVA_LANG_INVOKE_METHOD_HANDLE,
    JAVA_LANG_INVOKE_METHOD_TYPE, JAVA_LANG_STRING, JAVA_LANG_THROWABLE,
};
use crate::typing::{Frame, MethodContext};
use cw_classfile::constants::Constant;
use cw_classfile::descriptors::{MethodDescriptor, Type};
use cw_classfile::errors::ClassError;
use cw_classfile::instrs::{CpIndex, Instr, Instruction, LabeledInstr, WideInstr};
use cw_classfile::methods::INIT;
use cw_classfile::Addr;

impl<'a> AbstractForwardState<'a> for Frame {
    type Context<'c> = MethodContext<'c>;
    type Error = AnalysisError;

    fn init(ctx: &MethodContext<'a>) -> AnalysisResult<Self> {
        Self::at_entry(ctx)
    }

    fn join(&mut self, other: &Self, at: Addr, ctx: &MethodContext<'a>) -> AnalysisResult<bool> {
        self.join_at(other, at, ctx.classpath)
    }

    fn transfer_branch(&mut self, branch: &Branch, ctx: &MethodContext<'a>) -> AnalysisResult<()> {
        // only the exception object is live when entering a handler
        if let Branch::Catch(caught) = branch {
            let exception = match caught {
                Some(name) => TypeState::object(name),
                None => JAVA_LANG_THROWABLE.clone(),
            };
            log::trace!("{}: entering handler with {exception}", ctx.method_name);
            self.stack.clear();
            self.stack.push(exception);
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn transfer_instr(&mut self, linstr: &LabeledInstr, ctx: &MethodContext<'a>) -> AnalysisResult<()> {
        let mut step = Step {
            frame: self,
            linstr,
        };
        match linstr.instr() {
            Instr::Nop | Instr::Breakpoint | Instr::Goto(_) | Instr::GotoW(_) => Ok(()),

            // constants
            Instr::AconstNull => step.push(TypeState::Null),
            Instr::IconstM1
            | Instr::Iconst0
            | Instr::Iconst1
            | Instr::Iconst2
            | Instr::Iconst3
            | Instr::Iconst4
            | Instr::Iconst5
            | Instr::Bipush(_)
            | Instr::Sipush(_) => step.push(TypeState::Integer),
            Instr::Lconst0 | Instr::Lconst1 => step.push_type(&Type::Long),
            Instr::Fconst0 | Instr::Fconst1 | Instr::Fconst2 => step.push(TypeState::Float),
            Instr::Dconst0 | Instr::Dconst1 => step.push_type(&Type::Double),
            Instr::Ldc(index) | Instr::LdcW(index) => {
                let value = match ctx.class.constant_pool().get(index.value())? {
                    Constant::Integer(_) => TypeState::Integer,
                    Constant::Float(_) => TypeState::Float,
                    Constant::String { .. } => JAVA_LANG_STRING.clone(),
                    Constant::Class { .. } => JAVA_LANG_CLASS.clone(),
                    Constant::MethodType { .. } => JAVA_LANG_INVOKE_METHOD_TYPE.clone(),
                    Constant::MethodHandle { .. } => JAVA_LANG_INVOKE_METHOD_HANDLE.clone(),
                    cst => return Err(step.bad_constant(cst)),
                };
                step.push(value)
            }
            Instr::Ldc2W(index) => match ctx.class.constant_pool().get(index.value())? {
                Constant::Long(_) => step.push_type(&Type::Long),
                Constant::Double(_) => step.push_type(&Type::Double),
                cst => Err(step.bad_constant(cst)),
            },

            // loads
            Instr::Iload(n) => step.load(usize::from(*n), &Type::Int),
            Instr::Lload(n) => step.load(usize::from(*n), &Type::Long),
            Instr::Fload(n) => step.load(usize::from(*n), &Type::Float),
            Instr::Dload(n) => step.load(usize::from(*n), &Type::Double),
            Instr::Aload(n) => step.load_reference(usize::from(*n)),
            Instr::Iload0 => step.load(0, &Type::Int),
            Instr::Iload1 => step.load(1, &Type::Int),
            Instr::Iload2 => step.load(2, &Type::Int),
            Instr::Iload3 => step.load(3, &Type::Int),
            Instr::Lload0 => step.load(0, &Type::Long),
            Instr::Lload1 => step.load(1, &Type::Long),
            Instr::Lload2 => step.load(2, &Type::Long),
            Instr::Lload3 => step.load(3, &Type::Long),
            Instr::Fload0 => step.load(0, &Type::Float),
            Instr::Fload1 => step.load(1, &Type::Float),
            Instr::Fload2 => step.load(2, &Type::Float),
            Instr::Fload3 => step.load(3, &Type::Float),
            Instr::Dload0 => step.load(0, &Type::Double),
            Instr::Dload1 => step.load(1, &Type::Double),
            Instr::Dload2 => step.load(2, &Type::Double),
            Instr::Dload3 => step.load(3, &Type::Double),
            Instr::Aload0 => step.load_reference(0),
            Instr::Aload1 => step.load_reference(1),
            Instr::Aload2 => step.load_reference(2),
            Instr::Aload3 => step.load_reference(3),

            // array loads
            Instr::Iaload => step.array_load(&Type::Int),
            Instr::Laload => step.array_load(&Type::Long),
            Instr::Faload => step.array_load(&Type::Float),
            Instr::Daload => step.array_load(&Type::Double),
            Instr::Aaload => {
                step.pop_expect(&TypeState::Integer)?;
                let elt = match step.pop_array("array of references")? {
                    None => TypeState::Null,
                    Some(ArrayKind::Of(elt)) if elt.is_reference() => elt,
                    Some(kind) => return Err(step.bad_operand("array of references", &TypeState::array(kind))),
                };
                step.push(elt)
            }
            Instr::Baload => step.small_array_load(&[ArrayKind::Boolean, ArrayKind::Byte]),
            Instr::Caload => step.small_array_load(&[ArrayKind::Char]),
            Instr::Saload => step.small_array_load(&[ArrayKind::Short]),

            // stores
            Instr::Istore(n) => step.store(usize::from(*n), &Type::Int),
            Instr::Lstore(n) => step.store(usize::from(*n), &Type::Long),
            Instr::Fstore(n) => step.store(usize::from(*n), &Type::Float),
            Instr::Dstore(n) => step.store(usize::from(*n), &Type::Double),
            Instr::Astore(n) => step.store_reference(usize::from(*n)),
            Instr::Istore0 => step.store(0, &Type::Int),
            Instr::Istore1 => step.store(1, &Type::Int),
            Instr::Istore2 => step.store(2, &Type::Int),
            Instr::Istore3 => step.store(3, &Type::Int),
            Instr::Lstore0 => step.store(0, &Type::Long),
            Instr::Lstore1 => step.store(1, &Type::Long),
            Instr::Lstore2 => step.store(2, &Type::Long),
            Instr::Lstore3 => step.store(3, &Type::Long),
            Instr::Fstore0 => step.store(0, &Type::Float),
            Instr::Fstore1 => step.store(1, &Type::Float),
            Instr::Fstore2 => step.store(2, &Type::Float),
            Instr::Fstore3 => step.store(3, &Type::Float),
            Instr::Dstore0 => step.store(0, &Type::Double),
            Instr::Dstore1 => step.store(1, &Type::Double),
            Instr::Dstore2 => step.store(2, &Type::Double),
            Instr::Dstore3 => step.store(3, &Type::Double),
            Instr::Astore0 => step.store_reference(0),
            Instr::Astore1 => step.store_reference(1),
            Instr::Astore2 => step.store_reference(2),
            Instr::Astore3 => step.store_reference(3),

            // array stores
            Instr::Iastore => step.array_store(&Type::Int),
            Instr::Lastore => step.array_store(&Type::Long),
            Instr::Fastore => step.array_store(&Type::Float),
            Instr::Dastore => step.array_store(&Type::Double),
            Instr::Aastore => {
                step.pop_reference()?;
                step.pop_expect(&TypeState::Integer)?;
                match step.pop_array("array of references")? {
                    None => Ok(()),
                    Some(ArrayKind::Of(elt)) if elt.is_reference() => Ok(()),
                    Some(kind) => Err(step.bad_operand("array of references", &TypeState::array(kind))),
                }
            }
            Instr::Bastore => step.small_array_store(&[ArrayKind::Boolean, ArrayKind::Byte]),
            Instr::Castore => step.small_array_store(&[ArrayKind::Char]),
            Instr::Sastore => step.small_array_store(&[ArrayKind::Short]),

            // stack manipulation
            Instr::Pop => step.drop_words(1),
            Instr::Pop2 => step.drop_words(2),
            Instr::Dup => step.dup(1, 0),
            Instr::DupX1 => step.dup(1, 1),
            Instr::DupX2 => step.dup(1, 2),
            Instr::Dup2 => step.dup(2, 0),
            Instr::Dup2X1 => step.dup(2, 1),
            Instr::Dup2X2 => step.dup(2, 2),
            Instr::Swap => step.swap(),

            // arithmetic
            Instr::Iadd
            | Instr::Isub
            | Instr::Imul
            | Instr::Idiv
            | Instr::Irem
            | Instr::Ishl
            | Instr::Ishr
            | Instr::Iushr
            | Instr::Iand
            | Instr::Ior
            | Instr::Ixor => step.operation(&[Type::Int, Type::Int], &Type::Int),
            Instr::Ladd
            | Instr::Lsub
            | Instr::Lmul
            | Instr::Ldiv
            | Instr::Lrem
            | Instr::Land
            | Instr::Lor
            | Instr::Lxor => step.operation(&[Type::Long, Type::Long], &Type::Long),
            Instr::Lshl | Instr::Lshr | Instr::Lushr => {
                step.operation(&[Type::Long, Type::Int], &Type::Long)
            }
            Instr::Fadd | Instr::Fsub | Instr::Fmul | Instr::Fdiv | Instr::Frem => {
                step.operation(&[Type::Float, Type::Float], &Type::Float)
            }
            Instr::Dadd | Instr::Dsub | Instr::Dmul | Instr::Ddiv | Instr::Drem => {
                step.operation(&[Type::Double, Type::Double], &Type::Double)
            }
            Instr::Ineg => step.operation(&[Type::Int], &Type::Int),
            Instr::Lneg => step.operation(&[Type::Long], &Type::Long),
            Instr::Fneg => step.operation(&[Type::Float], &Type::Float),
            Instr::Dneg => step.operation(&[Type::Double], &Type::Double),
            Instr::Iinc(n, _) => step.check_local(usize::from(*n), &Type::Int),

            // conversions
            Instr::I2l => step.operation(&[Type::Int], &Type::Long),
            Instr::I2f => step.operation(&[Type::Int], &Type::Float),
            Instr::I2d => step.operation(&[Type::Int], &Type::Double),
            Instr::L2i => step.operation(&[Type::Long], &Type::Int),
            Instr::L2f => step.operation(&[Type::Long], &Type::Float),
            Instr::L2d => step.operation(&[Type::Long], &Type::Double),
            Instr::F2i => step.operation(&[Type::Float], &Type::Int),
            Instr::F2l => step.operation(&[Type::Float], &Type::Long),
            Instr::F2d => step.operation(&[Type::Float], &Type::Double),
            Instr::D2i => step.operation(&[Type::Double], &Type::Int),
            Instr::D2l => step.operation(&[Type::Double], &Type::Long),
            Instr::D2f => step.operation(&[Type::Double], &Type::Float),
            Instr::I2b | Instr::I2c | Instr::I2s => step.operation(&[Type::Int], &Type::Int),

            // comparisons
            Instr::Lcmp => step.operation(&[Type::Long, Type::Long], &Type::Int),
            Instr::Fcmpl | Instr::Fcmpg => step.operation(&[Type::Float, Type::Float], &Type::Int),
            Instr::Dcmpl | Instr::Dcmpg => step.operation(&[Type::Double, Type::Double], &Type::Int),

            // branches
            Instr::Ifeq(_)
            | Instr::Ifne(_)
            | Instr::Iflt(_)
            | Instr::Ifge(_)
            | Instr::Ifgt(_)
            | Instr::Ifle(_)
            | Instr::Tableswitch(_)
            | Instr::Lookupswitch(_) => step.pop_expect(&TypeState::Integer).map(drop),
            Instr::IfIcmpeq(_)
            | Instr::IfIcmpne(_)
            | Instr::IfIcmplt(_)
            | Instr::IfIcmpge(_)
            | Instr::IfIcmpgt(_)
            | Instr::IfIcmple(_) => {
                step.pop_expect(&TypeState::Integer)?;
                step.pop_expect(&TypeState::Integer).map(drop)
            }
            Instr::IfAcmpeq(_) | Instr::IfAcmpne(_) => {
                step.pop_reference()?;
                step.pop_reference().map(drop)
            }
            Instr::Ifnull(_) | Instr::Ifnonnull(_) => step.pop_reference().map(drop),
            Instr::Jsr(_) | Instr::JsrW(_) => step.push(TypeState::ReturnAddress(linstr.next_addr())),
            Instr::Ret(n) => step.check_return_address(usize::from(*n)),

            // returns
            Instr::Ireturn => step.value_return(ctx, &Type::Int),
            Instr::Lreturn => step.value_return(ctx, &Type::Long),
            Instr::Freturn => step.value_return(ctx, &Type::Float),
            Instr::Dreturn => step.value_return(ctx, &Type::Double),
            Instr::Areturn => {
                if !ctx.descriptor.return_type().is_reference() {
                    return Err(step.bad_return(ctx));
                }
                step.pop_reference().map(drop)
            }
            Instr::Return => {
                if ctx.descriptor.return_type() == &Type::Void {
                    Ok(())
                } else {
                    Err(step.bad_return(ctx))
                }
            }

            // fields
            Instr::Getstatic(index) => {
                let typ = field_type(ctx, *index)?;
                step.push_type(&typ)
            }
            Instr::Putstatic(index) => {
                let typ = field_type(ctx, *index)?;
                step.pop_type(&typ)
            }
            Instr::Getfield(index) => {
                let typ = field_type(ctx, *index)?;
                step.pop_reference()?;
                step.push_type(&typ)
            }
            Instr::Putfield(index) => {
                let typ = field_type(ctx, *index)?;
                step.pop_type(&typ)?;
                step.pop_reference().map(drop)
            }

            // invocations
            Instr::Invokevirtual(index) | Instr::Invokeinterface(index, _) => {
                step.invoke(ctx, *index, Receiver::Instance)
            }
            Instr::Invokespecial(index) => step.invoke(ctx, *index, Receiver::Special),
            Instr::Invokestatic(index) => step.invoke(ctx, *index, Receiver::None),
            Instr::Invokedynamic(index) => {
                let (_, descr) = ctx.class.constant_pool().invoke_dynamic(index.value())?;
                let descriptor = parse_method_descriptor(&descr)?;
                step.call(&descriptor)
            }

            // objects and arrays
            Instr::New(index) => match ctx.class.constant_pool().class_type(index.value())? {
                Type::Object(name) => step.push(TypeState::uninitialized_object(&name, linstr.addr())),
                typ => Err(step.bad_operand("class type", &TypeState::value_of(&typ))),
            },
            Instr::Newarray(atype) => {
                step.pop_expect(&TypeState::Integer)?;
                let array = TypeState::primitive_array(*atype).ok_or_else(|| {
                    TypeError::BadConstant {
                        pc: linstr.addr(),
                        op: linstr.mnemonic().to_string(),
                        kind: format!("array type {}", atype.0),
                    }
                })?;
                step.push(array)
            }
            Instr::Anewarray(index) => {
                step.pop_expect(&TypeState::Integer)?;
                let elt = TypeState::value_of(&ctx.class.constant_pool().class_type(index.value())?);
                step.push(TypeState::array(ArrayKind::Of(elt)))
            }
            Instr::Multianewarray(index, dims) => {
                let typ = ctx.class.constant_pool().class_type(index.value())?;
                match &typ {
                    Type::Array(n, _) if *dims >= 1 && usize::from(*dims) <= *n => {
                        for _ in 0..*dims {
                            step.pop_expect(&TypeState::Integer)?;
                        }
                        step.push(TypeState::value_of(&typ))
                    }
                    _ => Err(TypeError::BadConstant {
                        pc: linstr.addr(),
                        op: linstr.mnemonic().to_string(),
                        kind: format!("{dims}-dimensional {typ}"),
                    }
                    .into()),
                }
            }
            Instr::Arraylength => {
                let array = step.pop()?;
                if array.is_array_reference() {
                    step.push(TypeState::Integer)
                } else {
                    Err(step.bad_operand("array reference", &array))
                }
            }
            Instr::Checkcast(index) => {
                step.pop_reference()?;
                let typ = ctx.class.constant_pool().class_type(index.value())?;
                step.push(TypeState::value_of(&typ))
            }
            Instr::Instanceof(_) => {
                step.pop_reference()?;
                step.push(TypeState::Integer)
            }
            Instr::Athrow | Instr::Monitorenter | Instr::Monitorexit => {
                step.pop_reference().map(drop)
            }

            Instr::Wide(wide) => match wide {
                WideInstr::Iload(n) => step.load(usize::from(*n), &Type::Int),
                WideInstr::Lload(n) => step.load(usize::from(*n), &Type::Long),
                WideInstr::Fload(n) => step.load(usize::from(*n), &Type::Float),
                WideInstr::Dload(n) => step.load(usize::from(*n), &Type::Double),
                WideInstr::Aload(n) => step.load_reference(usize::from(*n)),
                WideInstr::Istore(n) => step.store(usize::from(*n), &Type::Int),
                WideInstr::Lstore(n) => step.store(usize::from(*n), &Type::Long),
                WideInstr::Fstore(n) => step.store(usize::from(*n), &Type::Float),
                WideInstr::Dstore(n) => step.store(usize::from(*n), &Type::Double),
                WideInstr::Astore(n) => step.store_reference(usize::from(*n)),
                WideInstr::Ret(n) => step.check_return_address(usize::from(*n)),
                WideInstr::Iinc(n, _) => step.check_local(usize::from(*n), &Type::Int),
            },
        }
    }
}

fn parse_method_descriptor(descr: &str) -> AnalysisResult<MethodDescriptor> {
    MethodDescriptor::parse(descr)
        .map_err(|err| ClassError::Descriptor(descr.to_string(), err).into())
}

fn field_type(ctx: &MethodContext, index: CpIndex) -> AnalysisResult<Type> {
    let field = ctx.class.constant_pool().member_ref(index.value())?;
    Type::parse_field(&field.descriptor)
        .map_err(|err| ClassError::Descriptor(field.descriptor, err).into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Receiver {
    None,
    Instance,
    /// `invokespecial`, that also initializes objects when calling `<init>`
    Special,
}

/// One instruction being interpreted over a frame.
struct Step<'f, 'i> {
    frame: &'f mut Frame,
    linstr: &'i LabeledInstr,
}

fn is_high_word(t: &TypeState) -> bool {
    matches!(t, TypeState::Long2 | TypeState::Double2)
}

impl Step<'_, '_> {
    fn op(&self) -> String {
        self.linstr.mnemonic().to_string()
    }

    fn bad_operand(&self, expected: &str, found: &TypeState) -> AnalysisError {
        TypeError::BadOperand {
            pc: self.linstr.addr(),
            op: self.op(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
        .into()
    }

    fn bad_constant(&self, cst: &Constant) -> AnalysisError {
        TypeError::BadConstant {
            pc: self.linstr.addr(),
            op: self.op(),
            kind: cst.kind().to_string(),
        }
        .into()
    }

    fn bad_return(&self, ctx: &MethodContext) -> AnalysisError {
        TypeError::BadReturn {
            pc: self.linstr.addr(),
            op: self.op(),
            expected: ctx.descriptor.return_type().to_string(),
        }
        .into()
    }

    fn underflow(&self) -> AnalysisError {
        TypeError::StackUnderflow {
            pc: self.linstr.addr(),
            op: self.op(),
        }
        .into()
    }

    fn push(&mut self, t: TypeState) -> AnalysisResult<()> {
        if self.frame.stack.len() >= self.frame.max_stack {
            return Err(TypeError::StackOverflow {
                pc: self.linstr.addr(),
                op: self.op(),
                max: self.frame.max_stack,
            }
            .into());
        }
        self.frame.stack.push(t);
        Ok(())
    }

    fn push_type(&mut self, typ: &Type) -> AnalysisResult<()> {
        for word in TypeState::words_of(typ) {
            self.push(word)?;
        }
        Ok(())
    }

    fn pop(&mut self) -> AnalysisResult<TypeState> {
        self.frame.stack.pop().ok_or_else(|| self.underflow())
    }

    fn pop_expect(&mut self, expected: &TypeState) -> AnalysisResult<TypeState> {
        let found = self.pop()?;
        if found.same(expected) {
            Ok(found)
        } else {
            Err(self.bad_operand(&expected.to_string(), &found))
        }
    }

    fn pop_reference(&mut self) -> AnalysisResult<TypeState> {
        let found = self.pop()?;
        if found.is_reference() {
            Ok(found)
        } else {
            Err(self.bad_operand("reference", &found))
        }
    }

    /// Pops the words of a value of the given type, high word first.
    fn pop_type(&mut self, typ: &Type) -> AnalysisResult<()> {
        for word in TypeState::words_of(typ).iter().rev() {
            self.pop_expect(word)?;
        }
        Ok(())
    }

    /// Pops an array reference; `None` stands for `null`.
    fn pop_array(&mut self, expected: &str) -> AnalysisResult<Option<ArrayKind>> {
        match self.pop()? {
            TypeState::Null => Ok(None),
            TypeState::ArrayRef(kind) => Ok(Some(*kind)),
            found => Err(self.bad_operand(expected, &found)),
        }
    }

    fn operation(&mut self, operands: &[Type], result: &Type) -> AnalysisResult<()> {
        for typ in operands.iter().rev() {
            self.pop_type(typ)?;
        }
        self.push_type(result)
    }

    fn array_load(&mut self, elt: &Type) -> AnalysisResult<()> {
        self.pop_expect(&TypeState::Integer)?;
        self.check_array_of(elt)?;
        self.push_type(elt)
    }

    fn array_store(&mut self, elt: &Type) -> AnalysisResult<()> {
        self.pop_type(elt)?;
        self.pop_expect(&TypeState::Integer)?;
        self.check_array_of(elt)
    }

    fn check_array_of(&mut self, elt: &Type) -> AnalysisResult<()> {
        let expected = ArrayKind::Of(TypeState::value_of(elt));
        let label = format!("{expected}");
        match self.pop_array(&label)? {
            Some(kind) if kind != expected => Err(self.bad_operand(&label, &TypeState::array(kind))),
            _ => Ok(()),
        }
    }

    fn check_small_array(&mut self, kinds: &[ArrayKind]) -> AnalysisResult<()> {
        let label = kinds
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        match self.pop_array(&label)? {
            Some(kind) if !kinds.contains(&kind) => Err(self.bad_operand(&label, &TypeState::array(kind))),
            _ => Ok(()),
        }
    }

    fn small_array_load(&mut self, kinds: &[ArrayKind]) -> AnalysisResult<()> {
        self.pop_expect(&TypeState::Integer)?;
        self.check_small_array(kinds)?;
        self.push(TypeState::Integer)
    }

    fn small_array_store(&mut self, kinds: &[ArrayKind]) -> AnalysisResult<()> {
        self.pop_expect(&TypeState::Integer)?;
        self.pop_expect(&TypeState::Integer)?;
        self.check_small_array(kinds)
    }

    fn local(&self, index: usize) -> AnalysisResult<&TypeState> {
        self.frame.locals.get(index).ok_or_else(|| {
            TypeError::LocalOutOfBounds {
                pc: self.linstr.addr(),
                op: self.op(),
                index,
                max: self.frame.locals.len(),
            }
            .into()
        })
    }

    /// Checks that the locals starting at `index` hold a value of type `typ`.
    fn check_local(&self, index: usize, typ: &Type) -> AnalysisResult<()> {
        for (i, expected) in TypeState::words_of(typ).iter().enumerate() {
            let found = self.local(index + i)?;
            if !found.same(expected) {
                return Err(TypeError::BadLocal {
                    pc: self.linstr.addr(),
                    op: self.op(),
                    index: index + i,
                    expected: expected.to_string(),
                    found: found.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    fn check_return_address(&self, index: usize) -> AnalysisResult<()> {
        match self.local(index)? {
            TypeState::ReturnAddress(_) => Ok(()),
            found => Err(TypeError::BadLocal {
                pc: self.linstr.addr(),
                op: self.op(),
                index,
                expected: "return address".to_string(),
                found: found.to_string(),
            }
            .into()),
        }
    }

    fn load(&mut self, index: usize, typ: &Type) -> AnalysisResult<()> {
        self.check_local(index, typ)?;
        self.push_type(typ)
    }

    fn load_reference(&mut self, index: usize) -> AnalysisResult<()> {
        let found = self.local(index)?.clone();
        if found.is_reference() {
            self.push(found)
        } else {
            Err(TypeError::BadLocal {
                pc: self.linstr.addr(),
                op: self.op(),
                index,
                expected: "reference".to_string(),
                found: found.to_string(),
            }
            .into())
        }
    }

    /// Writes one word in the locals. Overwriting half of a long or double
    /// makes the other half unusable.
    fn write_local(&mut self, index: usize, word: TypeState) -> AnalysisResult<()> {
        let previous = self.local(index)?;
        let low_half = matches!(previous, TypeState::Long | TypeState::Double);
        let high_half = is_high_word(previous);
        let locals = &mut self.frame.locals;
        if low_half && index + 1 < locals.len() {
            locals[index + 1] = TypeState::Top;
        }
        if high_half && index > 0 {
            locals[index - 1] = TypeState::Top;
        }
        locals[index] = word;
        Ok(())
    }

    fn store(&mut self, index: usize, typ: &Type) -> AnalysisResult<()> {
        let words = TypeState::words_of(typ);
        // bounds are checked before the operand is consumed
        self.local(index + words.len() - 1)?;
        self.pop_type(typ)?;
        for (i, word) in words.into_iter().enumerate() {
            self.write_local(index + i, word)?;
        }
        Ok(())
    }

    fn store_reference(&mut self, index: usize) -> AnalysisResult<()> {
        self.local(index)?;
        let value = self.pop()?;
        if value.is_reference() || matches!(value, TypeState::ReturnAddress(_)) {
            self.write_local(index, value)
        } else {
            Err(self.bad_operand("reference or return address", &value))
        }
    }

    /// Fails if the `depth` topmost words of the stack end in the middle of
    /// a long or double.
    fn check_cut(&self, depth: usize) -> AnalysisResult<()> {
        let stack = &self.frame.stack;
        let word = &stack[stack.len() - depth];
        if is_high_word(word) {
            Err(self.bad_operand("category 1 value", word))
        } else {
            Ok(())
        }
    }

    fn drop_words(&mut self, count: usize) -> AnalysisResult<()> {
        if self.frame.stack.len() < count {
            return Err(self.underflow());
        }
        self.check_cut(count)?;
        let len = self.frame.stack.len();
        self.frame.stack.truncate(len - count);
        Ok(())
    }

    /// Duplicates the `copied` topmost words below the `skipped` next ones.
    fn dup(&mut self, copied: usize, skipped: usize) -> AnalysisResult<()> {
        let len = self.frame.stack.len();
        if len < copied + skipped {
            return Err(self.underflow());
        }
        self.check_cut(copied)?;
        if skipped > 0 {
            self.check_cut(copied + skipped)?;
        }
        if len + copied > self.frame.max_stack {
            return Err(TypeError::StackOverflow {
                pc: self.linstr.addr(),
                op: self.op(),
                max: self.frame.max_stack,
            }
            .into());
        }
        let top = self.frame.stack[len - copied..].to_vec();
        let at = len - copied - skipped;
        for (i, word) in top.into_iter().enumerate() {
            self.frame.stack.insert(at + i, word);
        }
        Ok(())
    }

    fn swap(&mut self) -> AnalysisResult<()> {
        let len = self.frame.stack.len();
        if len < 2 {
            return Err(self.underflow());
        }
        for word in &self.frame.stack[len - 2..] {
            if matches!(
                word,
                TypeState::Long | TypeState::Long2 | TypeState::Double | TypeState::Double2
            ) {
                return Err(self.bad_operand("category 1 value", word));
            }
        }
        self.frame.stack.swap(len - 1, len - 2);
        Ok(())
    }

    fn value_return(&mut self, ctx: &MethodContext, typ: &Type) -> AnalysisResult<()> {
        if TypeState::value_of(ctx.descriptor.return_type()) != TypeState::value_of(typ) {
            return Err(self.bad_return(ctx));
        }
        self.pop_type(typ)
    }

    /// Pops the arguments of a call, then pushes its result.
    fn call(&mut self, descriptor: &MethodDescriptor) -> AnalysisResult<()> {
        let params: Vec<&Type> = descriptor.params().collect();
        for typ in params.into_iter().rev() {
            self.pop_type(typ)?;
        }
        self.push_type(descriptor.return_type())
    }

    fn invoke(&mut self, ctx: &MethodContext, index: CpIndex, receiver: Receiver) -> AnalysisResult<()> {
        let method = ctx.class.constant_pool().member_ref(index.value())?;
        let descriptor = parse_method_descriptor(&method.descriptor)?;
        if receiver == Receiver::None {
            return self.call(&descriptor);
        }

        let params: Vec<&Type> = descriptor.params().collect();
        for typ in params.into_iter().rev() {
            self.pop_type(typ)?;
        }
        let object = self.pop_reference()?;
        if receiver == Receiver::Special && method.name == INIT {
            self.initialize(&object);
        }
        self.push_type(descriptor.return_type())
    }

    /// Marks every copy of a freshly allocated object as initialized.
    fn initialize(&mut self, object: &TypeState) {
        let TypeState::Reference(uninit) = object else {
            return;
        };
        if uninit.initialized {
            return;
        }
        let pc = self.linstr.addr().0;
        for word in self.frame.stack.iter_mut().chain(self.frame.locals.iter_mut()) {
            if let TypeState::Reference(r) = word {
                if !r.initialized && r.name == uninit.name && r.create_pc == uninit.create_pc {
                    r.initialized = true;
                    r.init_pc = pc;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::ClassPath;
    use crate::controlflow::Cfg;
    use crate::typing::Types;
    use cw_classfile::testing::ClassBuilder;

    fn analyze(
        builder: &mut ClassBuilder,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: &[u8],
    ) -> AnalysisResult<(Types, bool)> {
        builder.method_with_code(0x0009, "m", descriptor, max_stack, max_locals, code, &[]);
        let class = builder.parse().unwrap();
        let classpath = ClassPath::default();
        let method = class.iter_methods().last().unwrap();
        let ctx = MethodContext::new(&class, method, &classpath)?;
        let cfg = Cfg::build(ctx.code, class.constant_pool())?;
        let types = Types::forward_compute(&cfg, &ctx)?;
        let stable = types.is_fixpoint(&cfg, &ctx)?;
        Ok((types, stable))
    }

    fn check(descriptor: &str, max_stack: u16, max_locals: u16, code: &[u8]) -> AnalysisResult<(Types, bool)> {
        analyze(&mut ClassBuilder::new("t/Check"), descriptor, max_stack, max_locals, code)
    }

    #[test]
    fn trivial_method() {
        let (types, stable) = check("()V", 0, 0, &[0xb1]).unwrap();
        assert!(stable);
        assert_eq!(1, types.entries.len());
        assert!(types.exits[&Addr(0)].stack().is_empty());
    }

    #[test]
    fn if_else_same_types() {
        //  0: iload_0  1: ifeq -> 8  4: iconst_1  5: goto -> 9  8: iconst_0  9: ireturn
        let code = [0x1a, 0x99, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x03, 0xac];
        let (types, stable) = check("(I)I", 1, 1, &code).unwrap();
        assert!(stable);
        assert_eq!(vec![TypeState::Integer], types.entries[&Addr(9)].stack());
    }

    #[test]
    fn if_else_mismatched_types() {
        //  0: iload_0  1: ifeq -> 8  4: iconst_1  5: goto -> 9  8: aconst_null  9: ireturn
        let code = [0x1a, 0x99, 0x00, 0x07, 0x04, 0xa7, 0x00, 0x04, 0x01, 0xac];
        assert!(matches!(
            check("(I)I", 1, 1, &code),
            Err(AnalysisError::Type(TypeError::StackMismatch { pc: Addr(9), .. }))
        ));
    }

    #[test]
    fn loops_reach_fixpoint() {
        //  0: iconst_0  1: istore_1
        //  2: iload_1   3: iload_0   4: if_icmpge -> 13
        //  7: iinc 1 1  10: goto -> 2
        // 13: iload_1  14: ireturn
        let code = [
            0x03, 0x3c, 0x1b, 0x1a, 0xa2, 0x00, 0x09, 0x84, 0x01, 0x01, 0xa7, 0xff, 0xf8, 0x1b,
            0xac,
        ];
        let (types, stable) = check("(I)I", 2, 2, &code).unwrap();
        assert!(stable);
        assert_eq!(
            vec![TypeState::Integer, TypeState::Integer],
            types.entries[&Addr(2)].locals()
        );
    }

    #[test]
    fn locals_unset_on_one_path_become_unusable() {
        //  0: iload_0  1: ifeq -> 6  4: iconst_1  5: istore_1  6: iload_1  7: ireturn
        let code = [0x1a, 0x99, 0x00, 0x05, 0x04, 0x3c, 0x1b, 0xac];
        assert!(matches!(
            check("(I)I", 1, 2, &code),
            Err(AnalysisError::Type(TypeError::BadLocal { index: 1, .. }))
        ));
    }

    #[test]
    fn long_arithmetic() {
        // lload_0 lconst_1 ladd l2i ireturn
        let (types, _) = check("(J)I", 4, 2, &[0x1e, 0x0a, 0x61, 0x88, 0xac]).unwrap();
        assert_eq!(vec![TypeState::Long, TypeState::Long2], types.entries[&Addr(0)].locals());
        // int returned from a long method
        assert!(matches!(
            check("(J)J", 4, 2, &[0x1e, 0xac]),
            Err(AnalysisError::Type(TypeError::BadReturn { .. }))
        ));
        // half of a long
        assert!(matches!(
            check("(J)V", 2, 2, &[0x1e, 0x57, 0x57, 0xb1]),
            Err(AnalysisError::Type(TypeError::BadOperand { .. }))
        ));
    }

    #[test]
    fn stack_bounds() {
        // iconst_0 iconst_0 with max_stack = 1
        assert!(matches!(
            check("()V", 1, 0, &[0x03, 0x03, 0xb1]),
            Err(AnalysisError::Type(TypeError::StackOverflow { .. }))
        ));
        // pop on empty stack
        assert!(matches!(
            check("()V", 1, 0, &[0x57, 0xb1]),
            Err(AnalysisError::Type(TypeError::StackUnderflow { .. }))
        ));
        // istore_1 with max_locals = 1
        assert!(matches!(
            check("()V", 1, 1, &[0x03, 0x3c, 0xb1]),
            Err(AnalysisError::Type(TypeError::LocalOutOfBounds { index: 1, .. }))
        ));
    }

    #[test]
    fn dup_family() {
        // iconst_1 iconst_2 dup_x1 -> [int, int, int]; pop pop pop return
        let (types, _) = check("()V", 3, 0, &[0x04, 0x05, 0x5a, 0x57, 0x57, 0x57, 0xb1]).unwrap();
        assert_eq!(1, types.exits.len());
        // dup of a long half
        assert!(matches!(
            check("()V", 4, 0, &[0x0a, 0x59, 0xb1]),
            Err(AnalysisError::Type(TypeError::BadOperand { .. }))
        ));
    }

    #[test]
    fn object_initialization() {
        let mut builder = ClassBuilder::new("t/Init");
        let cls = builder.class("t/Init");
        let init = builder.method_ref("t/Init", "<init>", "()V");
        //  0: new t/Init  3: dup  4: invokespecial <init>  7: astore_0  8: aload_0  9: areturn
        let code = [
            0xbb,
            (cls >> 8) as u8,
            cls as u8,
            0x59,
            0xb7,
            (init >> 8) as u8,
            init as u8,
            0x4b,
            0x2a,
            0xb0,
        ];
        let (types, stable) = analyze(&mut builder, "()Lt/Init;", 2, 1, &code).unwrap();
        assert!(stable);
        let exit = &types.exits[&Addr(0)];
        assert!(exit.stack().is_empty());
        match &exit.locals()[0] {
            TypeState::Reference(r) => {
                assert!(r.initialized);
                assert_eq!(0, r.create_pc);
                assert_eq!(4, r.init_pc);
            }
            t => panic!("unexpected local {t}"),
        }
    }

    #[test]
    fn field_and_invoke_operands() {
        let mut builder = ClassBuilder::new("t/Calls");
        let field = builder.field_ref("t/Calls", "count", "J");
        let method = builder.method_ref("t/Calls", "sum", "(IJ)D");
        //  0: getstatic count:J  3: l2i  4: getstatic count:J
        //  7: invokestatic sum(IJ)D  10: dreturn
        let code = [
            0xb2,
            (field >> 8) as u8,
            field as u8,
            0x88,
            0xb2,
            (field >> 8) as u8,
            field as u8,
            0xb8,
            (method >> 8) as u8,
            method as u8,
            0xaf,
        ];
        let (types, _) = analyze(&mut builder, "()D", 3, 0, &code).unwrap();
        assert!(types.exits[&Addr(0)].stack().is_empty());

        // wrong argument order
        let mut builder = ClassBuilder::new("t/Calls");
        let field = builder.field_ref("t/Calls", "count", "J");
        let method = builder.method_ref("t/Calls", "sum", "(JI)D");
        let code = [
            0xb2,
            (field >> 8) as u8,
            field as u8,
            0x88,
            0xb2,
            (field >> 8) as u8,
            field as u8,
            0xb8,
            (method >> 8) as u8,
            method as u8,
            0xaf,
        ];
        assert!(matches!(
            analyze(&mut builder, "()D", 3, 0, &code),
            Err(AnalysisError::Type(TypeError::BadOperand { pc: Addr(7), .. }))
        ));
    }

    #[test]
    fn arrays() {
        // iconst_2 newarray int  iconst_0 iaload ireturn
        let (types, _) = check("()I", 2, 0, &[0x05, 0xbc, 0x0a, 0x03, 0x2e, 0xac]).unwrap();
        assert!(types.exits[&Addr(0)].stack().is_empty());
        // iconst_2 newarray byte  iconst_0 iaload ireturn
        assert!(matches!(
            check("()I", 2, 0, &[0x05, 0xbc, 0x08, 0x03, 0x2e, 0xac]),
            Err(AnalysisError::Type(TypeError::BadOperand { .. }))
        ));
        // iconst_2 newarray byte  iconst_0 baload ireturn
        assert!(check("()I", 2, 0, &[0x05, 0xbc, 0x08, 0x03, 0x33, 0xac]).is_ok());
        // aconst_null arraylength ireturn
        assert!(check("()I", 1, 0, &[0x01, 0xbe, 0xac]).is_ok());
    }

    #[test]
    fn exception_handlers_see_the_exception() {
        let mut builder = ClassBuilder::new("t/Catch");
        let exc = builder.class("java/lang/ArithmeticException");
        //  0: iload_0  1: iconst_2  2: idiv  3: ireturn
        //  4: astore_1 5: iconst_0  6: ireturn
        let code = [0x1a, 0x05, 0x6c, 0xac, 0x4c, 0x03, 0xac];
        builder.method_with_code(0x0009, "m", "(I)I", 2, 2, &code, &[(0, 3, 4, exc)]);
        let class = builder.parse().unwrap();
        let classpath = ClassPath::default();
        let method = class.iter_methods().next().unwrap();
        let ctx = MethodContext::new(&class, method, &classpath).unwrap();
        let cfg = Cfg::build(ctx.code, class.constant_pool()).unwrap();
        let types = Types::forward_compute(&cfg, &ctx).unwrap();
        assert_eq!(
            vec![TypeState::object("java/lang/ArithmeticException")],
            types.entries[&Addr(4)].stack()
        );
    }

    #[test]
    fn subroutines() {
        //  0: jsr -> 4  3: return  4: astore_0  5: ret 0
        let (types, _) = check("()V", 1, 1, &[0xa8, 0x00, 0x04, 0xb1, 0x4b, 0xa9, 0x00]).unwrap();
        assert_eq!(
            vec![TypeState::ReturnAddress(Addr(3))],
            types.exits[&Addr(4)].locals()
        );
        // ret on a non return address
        assert!(matches!(
            check("(I)V", 1, 1, &[0xa9, 0x00]),
            Err(AnalysisError::Type(TypeError::BadLocal { .. }))
        ));
    }
}
