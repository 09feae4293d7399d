use hlcore::{
    magic::PRECISE_MARKER_FN_NAME, module::HlModule, precise, utils::error::HlError,
};
use hlinstr::{
    instructions::{FBinOp, FBinary, HlInstr, MAlloca, MLoad, MStore},
    module::{Function, FunctionId, InstructionRef, Module},
    operand::{Label, Operand},
    types::{TypeRegistry, primary::FType},
};

/// `%1 = alloca; %2 = %0 * %0; store %2 -> %1; %3 = load %1`
fn module_with_slot() -> (Module, FunctionId, TypeRegistry) {
    let registry = TypeRegistry::new([0; 6]);
    let f32_ty = registry.search_or_insert(FType::Fp32.into());
    let mut function = Function::new("main", vec![(0, f32_ty)]);
    for instr in [
        HlInstr::MAlloca(MAlloca {
            dest: 1,
            ty: f32_ty,
        }),
        HlInstr::FBinary(FBinary {
            dest: 2,
            ty: f32_ty,
            op: FBinOp::FMul,
            lhs: Operand::Reg(0),
            rhs: Operand::Reg(0),
        }),
        HlInstr::MStore(MStore {
            addr: Operand::Reg(1),
            value: Operand::Reg(2),
        }),
        HlInstr::MLoad(MLoad {
            dest: 3,
            ty: f32_ty,
            addr: Operand::Reg(1),
        }),
    ] {
        function.push(Label::NIL, instr).expect("entry block exists");
    }

    let mut module = Module::new("precise");
    let main = module.add_function(function);
    (module, main, registry)
}

#[test]
fn marker_calls_follow_value_replacement() {
    let (mut module, main, registry) = module_with_slot();
    let f32_ty = registry.search_or_insert(FType::Fp32.into());
    let model = HlModule::default();

    let marked = model
        .mark_precise_pointer_via_calls(&mut module, main, 1)
        .expect("main exists");
    assert_eq!(marked, 1);
    assert_eq!(precise::marker_call_count(&module), 1);

    // Rewrite %2 into %5 the way a transform would: build the replacement,
    // redirect every use, then erase the original definition.
    let function = module.function_mut(main).expect("main exists");
    function
        .insert(
            InstructionRef {
                block: Label::NIL,
                index: 1,
            },
            HlInstr::FBinary(FBinary {
                dest: 5,
                ty: f32_ty,
                op: FBinOp::FAdd,
                lhs: Operand::Reg(0),
                rhs: Operand::Reg(0),
            }),
        )
        .expect("entry block exists");
    assert_eq!(function.replace_all_uses_with(2, &Operand::Reg(5)), 2);
    let old = function.find_definition(2).expect("%2 is defined");
    function.erase(old).expect("%2 erased");

    assert_eq!(model.resolve_precise_marker_calls(&mut module), 1);

    let function = module.function(main).expect("main exists");
    assert!(precise::has_tag(function, 5));
    assert!(!precise::has_tag(function, 2));
    assert_eq!(precise::marker_call_count(&module), 0);
    assert!(module.get_function_by_name(PRECISE_MARKER_FN_NAME).is_none());
    assert_eq!(function.instructions().count(), 4);
}

#[test]
fn tags_do_not_survive_erasure() {
    let (mut module, main, _) = module_with_slot();
    let function = module.function_mut(main).expect("main exists");

    precise::mark_via_tag(function, 2);
    let def = function.find_definition(2).expect("%2 is defined");
    function.erase(def).expect("%2 erased");
    assert!(!precise::has_tag(function, 2));
}

#[test]
fn single_value_marking() {
    let (mut module, main, _) = module_with_slot();
    let model = HlModule::default();

    model
        .mark_precise_via_call(&mut module, main, 3)
        .expect("%3 is defined");
    let marker = precise::marker_function(&module).expect("marker declared");
    assert!(module.function(marker).expect("marker exists").is_declaration());

    // The call lands right after the load defining %3.
    let function = module.function(main).expect("main exists");
    let (at, _) = function
        .instructions()
        .find(|(_, instr)| instr.callee() == Some(marker))
        .expect("marker call");
    assert_eq!(at.index, 4);

    assert_eq!(precise::resolve_marker_calls(&mut module), 1);
    let function = module.function(main).expect("main exists");
    assert!(precise::has_tag(function, 3));
}

#[test]
fn resolving_without_marker_is_a_no_op() {
    let (mut module, main, _) = module_with_slot();
    assert_eq!(precise::resolve_marker_calls(&mut module), 0);
    assert!(!precise::has_tag(module.function(main).expect("main exists"), 2));
}

#[test]
fn failed_marking_declares_nothing() {
    let (mut module, main, _) = module_with_slot();
    let model = HlModule::default();

    assert!(matches!(
        model.mark_precise_via_call(&mut module, main, 42),
        Err(HlError::NotFound(_))
    ));
    assert!(precise::marker_function(&module).is_none());
    assert_eq!(
        module.function(main).expect("main exists").instructions().count(),
        4
    );
}
