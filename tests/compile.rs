// tests/compile.rs
//! End-to-end pipeline tests: source text through resolution, typing, and
//! lowering, with assertions on the emitted instruction stream.

use snuggle::driver::{Analysis, Compiler};
use snuggle::errors::{CompileError, LoweringError, ResolutionError, TypingError};
use snuggle::lower::{
    CallKind, CodeBlock, Constant, GeneratedType, Instruction, MethodBody, Program, RawOp,
};
use snuggle::sema::type_arena::TypeSlot;

fn compiler_for(sources: &[(&str, &str)]) -> Compiler {
    let mut compiler = Compiler::new();
    for (name, text) in sources {
        compiler.add_source(*name, *text);
    }
    compiler
}

fn compile(sources: &[(&str, &str)]) -> Program {
    compiler_for(sources)
        .compile("main")
        .expect("program should compile")
}

fn analyze(sources: &[(&str, &str)]) -> Analysis {
    compiler_for(sources)
        .analyze("main")
        .expect("program should analyze")
}

fn compile_one(source: &str) -> Program {
    compile(&[("main", source)])
}

fn compile_err(source: &str) -> CompileError {
    compiler_for(&[("main", source)])
        .compile("main")
        .expect_err("program should fail to compile")
}

/// Flatten nested `Code` sequences into one instruction list
fn flatten(block: &CodeBlock) -> Vec<&Instruction> {
    fn walk<'a>(instrs: &'a [Instruction], out: &mut Vec<&'a Instruction>) {
        for i in instrs {
            if let Instruction::Code(inner) = i {
                walk(inner, out);
            } else {
                out.push(i);
            }
        }
    }
    let mut out = Vec::new();
    walk(&block.instructions, &mut out);
    out
}

fn raw_ops(block: &CodeBlock) -> Vec<RawOp> {
    flatten(block)
        .iter()
        .filter_map(|i| match i {
            Instruction::Bytecodes { ops, .. } => Some(ops.to_vec()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn method_block<'a>(program: &'a Program, type_name: &str, method: &str) -> &'a CodeBlock {
    let generated = program
        .type_named(type_name)
        .unwrap_or_else(|| panic!("no generated type {type_name}"));
    let m = generated
        .methods()
        .iter()
        .find(|m| m.runtime_name == method)
        .unwrap_or_else(|| panic!("no method {method} on {type_name}"));
    match &m.body {
        MethodBody::Snuggle(block) => block,
        other => panic!("expected a lowered body, got {other:?}"),
    }
}

fn last_expr_type_name(analysis: &Analysis, file: &str) -> String {
    let (_, typed_file) = analysis
        .typed
        .files
        .iter()
        .find(|(name, _)| name == file)
        .expect("file was analyzed");
    let last = typed_file.exprs.last().expect("file has expressions");
    analysis.typed.arena.name(last.ty).to_string()
}

// ----------------------------------------------------------------------
// Spec scenarios
// ----------------------------------------------------------------------

#[test]
fn generic_static_method_specializes_at_i32() {
    let source = "class C { static fn id<T>(x: T): T x }\nC.id::<i32>(7)";
    let analysis = analyze(&[("main", source)]);
    assert_eq!(last_expr_type_name(&analysis, "main"), "i32");

    let program = compile_one(source);
    let top = flatten(&program.top_level["main"]);
    assert!(
        top.iter()
            .any(|i| matches!(i, Instruction::Push(Constant::Int(7), _))),
        "argument literal is pushed"
    );
    assert!(
        top.iter().any(|i| matches!(
            i,
            Instruction::Call { kind: CallKind::Static, method } if method.name == "id"
        )),
        "static generic method is invoked statically"
    );
    // The specialization's body is emitted on C
    let body = method_block(&program, "C", "id");
    assert!(
        flatten(body)
            .iter()
            .any(|i| matches!(i, Instruction::Return(Some(_))))
    );
}

#[test]
fn boolean_builtins_emit_ior_iand_ixor() {
    let ops = raw_ops(&compile_one("true.add(false)").top_level["main"]);
    assert!(ops.contains(&RawOp::Ior), "bool.add lowers to IOR: {ops:?}");

    let ops = raw_ops(&compile_one("true.mul(false)").top_level["main"]);
    assert!(ops.contains(&RawOp::Iand), "bool.mul lowers to IAND: {ops:?}");

    let ops = raw_ops(&compile_one("true.not()").top_level["main"]);
    let pair = ops
        .windows(2)
        .any(|w| w == [RawOp::Iconst(1), RawOp::Ixor]);
    assert!(pair, "bool.not lowers to ICONST_1, IXOR: {ops:?}");
}

#[test]
fn plural_return_travels_through_static_channels() {
    let source = "\
struct T3 { a: i32 b: i32 c: i32 }
class C { static fn make(): T3 new T3 { 1, 2, 3 } }
C.make()";
    let program = compile_one(source);

    // Callee: all but the first leaf stored into RETURN! channels on T3
    let make = flatten(method_block(&program, "C", "make"));
    let puts: Vec<&str> = make
        .iter()
        .filter_map(|i| match i {
            Instruction::PutStaticField(f) if f.owner == "T3" => Some(f.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(puts, vec!["RETURN! $c", "RETURN! $b"]);
    assert!(matches!(make.last(), Some(Instruction::Return(Some(_)))));

    // Caller: first leaf from the stack, the rest from the channels
    let top = flatten(&program.top_level["main"]);
    let gets: Vec<&str> = top
        .iter()
        .filter_map(|i| match i {
            Instruction::GetStaticField(f) if f.owner == "T3" => Some(f.name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(gets, vec!["RETURN! $b", "RETURN! $c"]);

    // Call-return width: three leaves reach the caller's stack, and the
    // discarded result pops exactly three times
    let pops = top
        .iter()
        .filter(|i| matches!(i, Instruction::Pop(_)))
        .count();
    assert_eq!(pops, 3);

    // The value type declares its return channels
    let Some(GeneratedType::ValueType(t3)) = program.type_named("T3") else {
        panic!("T3 is generated as a value type");
    };
    let channels: Vec<&str> = t3
        .returning_fields
        .iter()
        .map(|f| f.runtime_name.as_str())
        .collect();
    assert_eq!(channels, vec!["RETURN! $b", "RETURN! $c"]);
}

#[test]
fn cyclic_class_references_resolve_without_overflow() {
    let analysis = analyze(&[("main", "class A { b: B }\nclass B { a: A }")]);
    let arena = &analysis.typed.arena;

    let a = arena
        .iter()
        .find_map(|(id, slot)| match slot {
            TypeSlot::Ready(def) if def.name == "A" => Some(id),
            _ => None,
        })
        .expect("A was specialized");
    let a_def = arena.def(a).expect("A is ready");
    assert_eq!(a_def.fields[0].name, "b");
    assert_eq!(arena.name(a_def.fields[0].ty), "B");

    let b_def = arena.def(a_def.fields[0].ty).expect("B is ready");
    assert_eq!(arena.name(b_def.fields[0].ty), "A");
}

#[test]
fn import_exposes_types_only_after_the_import() {
    let lib = "pub class K { }";
    let program = compile(&[("main", "import \"lib\"\nnew K()"), ("lib", lib)]);
    assert!(
        flatten(&program.top_level["main"])
            .iter()
            .any(|i| matches!(i, Instruction::RunImport(f) if f == "lib"))
    );
    assert!(program.type_named("K").is_some());

    let err = compiler_for(&[("main", "new K()\nimport \"lib\""), ("lib", lib)])
        .compile("main")
        .expect_err("K is not visible before the import");
    assert!(matches!(
        err,
        CompileError::Resolve(ResolutionError::UnknownType { ref name, .. }) if name == "K"
    ));
}

#[test]
fn overloads_disambiguate_in_source_order() {
    let source = "\
class D { fn f(x: i32): i32 x fn f(x: string): i32 1 }
new D().f(\"s\")";
    let program = compile_one(source);

    let d = program.type_named("D").expect("D generated");
    let names: Vec<&str> = d
        .methods()
        .iter()
        .map(|m| m.runtime_name.as_str())
        .collect();
    assert!(names.contains(&"f"));
    assert!(names.contains(&"f$1"));

    // The string overload is the second in source order
    let top = flatten(&program.top_level["main"]);
    assert!(top.iter().any(|i| matches!(
        i,
        Instruction::Call { method, .. } if method.name == "f$1"
    )));
}

// ----------------------------------------------------------------------
// Universal properties
// ----------------------------------------------------------------------

#[test]
fn equal_argument_tuples_share_one_specialization() {
    let source = "\
struct P<T> { x: T }
let a = new P<i32> { 1 }
let b = new P<i32> { 2 }";
    let analysis = analyze(&[("main", source)]);
    let count = analysis
        .typed
        .arena
        .iter()
        .filter(|(_, slot)| matches!(slot, TypeSlot::Ready(def) if def.name == "P<i32>"))
        .count();
    assert_eq!(count, 1);
}

#[test]
fn plural_struct_round_trips_through_locals() {
    let source = "\
struct S { a: i32 b: i32 }
let s = new S { 1, 2 }
s.a = 9
s.a";
    let analysis = analyze(&[("main", source)]);
    assert_eq!(last_expr_type_name(&analysis, "main"), "i32");

    let program = compile_one(source);
    let top = flatten(&program.top_level["main"]);
    // Declaration stores both leaves; the write then hits only slot 0
    assert!(top
        .iter()
        .any(|i| matches!(i, Instruction::StoreLocal(1, _))));
    let write = top.iter().position(
        |i| matches!(i, Instruction::Push(Constant::Int(9), _)),
    );
    assert!(write.is_some());
    assert!(top
        .iter()
        .skip(write.unwrap())
        .any(|i| matches!(i, Instruction::StoreLocal(0, _))));
    // The read loads only the requested leaf
    assert!(top
        .iter()
        .skip(write.unwrap())
        .any(|i| matches!(i, Instruction::LoadLocal(0, _))));
}

#[test]
fn local_binding_shadows_type_name_in_receiver_position() {
    // With a local in scope, the local wins
    let source = "\
class X { static fn f(): i32 1 }
let X = 2
X.add(1)";
    let analysis = analyze(&[("main", source)]);
    assert_eq!(last_expr_type_name(&analysis, "main"), "i32");
    let ops = raw_ops(&compile_one(source).top_level["main"]);
    assert!(ops.contains(&RawOp::Iadd), "local integer add wins: {ops:?}");

    // Without the local, the type wins and the call is static
    let source = "class X { static fn f(): i32 1 }\nX.f()";
    let top_program = compile_one(source);
    let top = flatten(&top_program.top_level["main"]);
    assert!(top.iter().any(|i| matches!(
        i,
        Instruction::Call { kind: CallKind::Static, method } if method.name == "f"
    )));
}

// ----------------------------------------------------------------------
// Pass-specific behavior
// ----------------------------------------------------------------------

#[test]
fn stray_super_is_a_resolution_error() {
    assert!(matches!(
        compile_err("super"),
        CompileError::Resolve(ResolutionError::StraySuper { .. })
    ));
}

#[test]
fn missing_import_is_reported() {
    assert!(matches!(
        compile_err("import \"nowhere\""),
        CompileError::Resolve(ResolutionError::MissingImport { ref file, .. }) if file == "nowhere"
    ));
}

#[test]
fn reflected_print_loads_the_singleton_instance() {
    let program = compile_one("print.println(\"hi\")");
    let top = flatten(&program.top_level["main"]);
    assert!(top.iter().any(|i| matches!(
        i,
        Instruction::GetStaticField(f)
            if f.owner == "snuggle/runtime/Print" && f.name == "INSTANCE"
    )));
    assert!(top.iter().any(|i| matches!(
        i,
        Instruction::Call { kind: CallKind::Virtual, method }
            if method.owner == "snuggle/runtime/Print" && method.name == "println"
    )));
}

#[test]
fn renamed_reflected_overload_resolves_by_argument_type() {
    // printlnInt is bridged under the name println; the i32 argument
    // selects it
    let program = compile_one("print.println(3)");
    let top = flatten(&program.top_level["main"]);
    assert!(top.iter().any(|i| matches!(
        i,
        Instruction::Call { method, .. } if method.name == "printlnInt"
    )));
}

#[test]
fn option_factory_specializes_through_explicit_arguments() {
    let source = "Option.some::<i32>(5).get()";
    let analysis = analyze(&[("main", source)]);
    assert_eq!(last_expr_type_name(&analysis, "main"), "i32");

    let program = compile_one(source);
    let top = flatten(&program.top_level["main"]);
    assert!(top
        .iter()
        .any(|i| matches!(i, Instruction::Push(Constant::Bool(true), _))));
}

#[test]
fn const_methods_are_rejected_at_lowering() {
    let err = compile_err("class K { const fn c(): i32 1 }\nnew K().c()");
    assert!(matches!(
        err,
        CompileError::Lower(LoweringError::ConstMethodCall { .. })
    ));
}

#[test]
fn fallible_pattern_is_not_yet_supported() {
    let source = "\
class A { }
class B: A { }
let a: A = new B()
let b: B = a";
    let err = compile_err(source);
    assert!(matches!(
        err,
        CompileError::Type(TypingError::FalliblePattern { .. })
    ));
}

#[test]
fn enum_variants_push_their_ordinal() {
    let source = "enum Color { Red, Green }\nColor.Green().ordinal()";
    let analysis = analyze(&[("main", source)]);
    assert_eq!(last_expr_type_name(&analysis, "main"), "i32");

    let program = compile_one(source);
    let top = flatten(&program.top_level["main"]);
    assert!(top
        .iter()
        .any(|i| matches!(i, Instruction::Push(Constant::Int(1), _))));
}

#[test]
fn super_calls_invoke_the_supertype_specially() {
    let source = "\
class A { fn greet(): i32 1 }
class B: A { fn greet(): i32 super.greet().add(1) }
new B().greet()";
    let program = compile_one(source);
    let greet = flatten(method_block(&program, "B", "greet"));
    assert!(greet.iter().any(|i| matches!(
        i,
        Instruction::Call { kind: CallKind::Special, method }
            if method.owner == "A" && method.name == "greet"
    )));

    let Some(GeneratedType::Class(b)) = program.type_named("B") else {
        panic!("B is generated as a class");
    };
    assert_eq!(b.supertype, "A");
}

#[test]
fn while_loops_lower_to_label_branching() {
    let source = "let x = 1\nwhile x.lt(10) { x = x.add(1) }";
    let program = compile_one(source);
    let top = flatten(&program.top_level["main"]);
    assert!(top
        .iter()
        .any(|i| matches!(i, Instruction::JumpIfFalse(_))));
    assert!(top.iter().any(|i| matches!(i, Instruction::Jump(_))));
}

#[test]
fn lambdas_erase_to_an_interface_and_capture_locals() {
    let source = "\
let y = 5
let f = fn(x: i32): i32 x.add(y)
f.invoke(2)";
    let analysis = analyze(&[("main", source)]);
    assert_eq!(last_expr_type_name(&analysis, "main"), "i32");

    let program = compile_one(source);
    let impl_ty = program
        .types
        .iter()
        .find_map(|t| match t {
            GeneratedType::FuncImpl(f) => Some(f),
            _ => None,
        })
        .expect("one closure implementation is generated");
    assert_eq!(impl_ty.fields.len(), 1);
    assert_eq!(impl_ty.fields[0].runtime_name, "y");

    let top = flatten(&program.top_level["main"]);
    assert!(top.iter().any(|i| matches!(
        i,
        Instruction::PutReferenceTypeField(f) if f.name == "y"
    )));
    assert!(top.iter().any(|i| matches!(
        i,
        Instruction::Call { kind: CallKind::Interface, method } if method.name == "invoke"
    )));
}

#[test]
fn tuple_declarations_bind_consecutive_slots() {
    let source = "let (a, b) = (1, 2)\na.add(b)";
    let analysis = analyze(&[("main", source)]);
    assert_eq!(last_expr_type_name(&analysis, "main"), "i32");

    let program = compile_one(source);
    let top = flatten(&program.top_level["main"]);
    assert!(top
        .iter()
        .any(|i| matches!(i, Instruction::LoadLocal(1, _))));
}

#[test]
fn alias_cycles_are_detected() {
    let err = compile_err("type A2 = B2\ntype B2 = A2");
    assert!(matches!(
        err,
        CompileError::Type(TypingError::AliasCycle { .. })
    ));
}

#[test]
fn field_access_through_references_uses_mangled_paths() {
    let source = "\
struct Pos { x: i32 y: i32 }
class Node { p: Pos }
new Node().p.x";
    let program = compile_one(source);
    let top = flatten(&program.top_level["main"]);
    assert!(top.iter().any(|i| matches!(
        i,
        Instruction::GetReferenceTypeField(f)
            if f.owner == "Node" && f.name == "p$x"
    )));

    // The class's generated fields carry the flattened names
    let Some(GeneratedType::Class(node)) = program.type_named("Node") else {
        panic!("Node is generated as a class");
    };
    let field_names: Vec<&str> = node
        .fields
        .iter()
        .map(|f| f.runtime_name.as_str())
        .collect();
    assert_eq!(field_names, vec!["p$x", "p$y"]);
}
