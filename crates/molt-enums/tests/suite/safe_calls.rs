//! The modeled virtual calls and the enum-intrinsic static calls.

use molt_ir::{CodeBuilder, ProgramBuilder, Reg};

use crate::suite::fixtures::{
    add_class, add_enum, add_generated_enum, add_static_method, run_pass,
};

#[test]
fn equals_between_same_singleton_is_accepted() {
    // static boolean same(E a, E b) { return a.equals(b); }
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A", "B"]);
    let equals = pb.method_ref("LE;", "equals", "(Ljava/lang/Object;)Z");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.load_param_object(Reg(1));
    b.invoke_virtual(equals, vec![Reg(0), Reg(1)]);
    b.move_result(Reg(2));
    b.ret(Reg(2));
    add_static_method(&mut pb, app, "same", "(LE;LE;)Z", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn compare_to_between_distinct_enums_rejects_both() {
    // static int cmp(E1 a, E2 b) { return a.compareTo(b); }
    let mut pb = ProgramBuilder::new();
    let e1 = add_enum(&mut pb, "LE1;", &["A"]);
    let e2 = add_enum(&mut pb, "LE2;", &["X"]);
    let compare_to = pb.method_ref("LE1;", "compareTo", "(Ljava/lang/Enum;)I");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.load_param_object(Reg(1));
    b.invoke_virtual(compare_to, vec![Reg(0), Reg(1)]);
    b.move_result(Reg(2));
    b.ret(Reg(2));
    add_static_method(&mut pb, app, "cmp", "(LE1;LE2;)I", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e1, e2]);
    assert!(result.is_empty());
}

#[test]
fn name_on_a_single_enum_type_is_accepted() {
    // static String label(E e) { return e.name(); }
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let name = pb.method_ref("LE;", "name", "()Ljava/lang/String;");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.invoke_virtual(name, vec![Reg(0)]);
    b.move_result_object(Reg(1));
    b.ret_object(Reg(1));
    add_static_method(&mut pb, app, "label", "(LE;)Ljava/lang/String;", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn ordinal_on_a_mixed_receiver_rejects() {
    // The receiver may be E1 or E2 at the call site.
    let mut pb = ProgramBuilder::new();
    let e1 = add_enum(&mut pb, "LE1;", &["A"]);
    let e2 = add_enum(&mut pb, "LE2;", &["X"]);
    let ordinal = pb.method_ref("LE1;", "ordinal", "()I");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    let else_l = b.new_label();
    let join_l = b.new_label();
    b.load_param(Reg(0));
    b.load_param_object(Reg(1));
    b.load_param_object(Reg(2));
    b.if_eqz(Reg(0), else_l);
    b.move_object(Reg(3), Reg(1));
    b.goto(join_l);
    b.bind(else_l);
    b.move_object(Reg(3), Reg(2));
    b.bind(join_l);
    b.invoke_virtual(ordinal, vec![Reg(3)]);
    b.move_result(Reg(4));
    b.ret(Reg(4));
    add_static_method(&mut pb, app, "which", "(ZLE1;LE2;)I", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e1, e2]);
    assert!(result.is_empty());
}

#[test]
fn to_string_on_enum_receiver_is_accepted() {
    // Enum.toString() on a receiver statically typed as java.lang.Enum.
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let to_string = pb.method_ref("Ljava/lang/Enum;", "toString", "()Ljava/lang/String;");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.invoke_virtual(to_string, vec![Reg(0)]);
    b.move_result_object(Reg(1));
    b.ret_object(Reg(1));
    add_static_method(&mut pb, app, "show", "(LE;)Ljava/lang/String;", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn string_builder_append_with_single_type_is_accepted() {
    // static void log(StringBuilder sb, E e) { sb.append(e); }
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let append = pb.method_ref(
        "Ljava/lang/StringBuilder;",
        "append",
        "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
    );
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.load_param_object(Reg(1));
    b.invoke_virtual(append, vec![Reg(0), Reg(1)]);
    b.move_result_object(Reg(2));
    b.ret_void();
    add_static_method(
        &mut pb,
        app,
        "log",
        "(Ljava/lang/StringBuilder;LE;)V",
        b.finish(),
    );
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn string_builder_append_with_mixed_types_rejects() {
    let mut pb = ProgramBuilder::new();
    let e1 = add_enum(&mut pb, "LE1;", &["A"]);
    let e2 = add_enum(&mut pb, "LE2;", &["X"]);
    let append = pb.method_ref(
        "Ljava/lang/StringBuilder;",
        "append",
        "(Ljava/lang/Object;)Ljava/lang/StringBuilder;",
    );
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    let else_l = b.new_label();
    let join_l = b.new_label();
    b.load_param(Reg(0));
    b.load_param_object(Reg(1));
    b.load_param_object(Reg(2));
    b.load_param_object(Reg(3));
    b.if_eqz(Reg(0), else_l);
    b.move_object(Reg(4), Reg(2));
    b.goto(join_l);
    b.bind(else_l);
    b.move_object(Reg(4), Reg(3));
    b.bind(join_l);
    b.invoke_virtual(append, vec![Reg(1), Reg(4)]);
    b.move_result_object(Reg(5));
    b.ret_void();
    add_static_method(
        &mut pb,
        app,
        "log",
        "(ZLjava/lang/StringBuilder;LE1;LE2;)V",
        b.finish(),
    );
    let program = pb.finish();

    let result = run_pass(&program, &[e1, e2]);
    assert!(result.is_empty());
}

#[test]
fn other_virtual_calls_on_a_candidate_reject_it() {
    // static void poke(E e) { e.helper(); } is not on the safe list.
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let helper = pb.method_ref("LE;", "helper", "()V");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.invoke_virtual(helper, vec![Reg(0)]);
    b.ret_void();
    add_static_method(&mut pb, app, "poke", "(LE;)V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.is_empty());
}

#[test]
fn values_and_valueof_calls_are_safe() {
    // static E parse(String s) { E[] all = E.values(); return E.valueOf(s); }
    let mut pb = ProgramBuilder::new();
    let e = add_generated_enum(&mut pb, "LE;");
    let values = pb.method_ref("LE;", "values", "()[LE;");
    let valueof = pb.method_ref("LE;", "valueOf", "(Ljava/lang/String;)LE;");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.invoke_static(values, vec![]);
    b.move_result_object(Reg(1));
    b.invoke_static(valueof, vec![Reg(0)]);
    b.move_result_object(Reg(2));
    b.ret_object(Reg(2));
    add_static_method(&mut pb, app, "parse", "(Ljava/lang/String;)LE;", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn static_helper_on_candidate_with_consistent_args_is_accepted() {
    // A user-written static helper on the enum class itself; arguments check
    // out, and static calls carry no receiver to reject.
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let helper_ref = pb.method_ref("LE;", "describe", "(LE;)V");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.invoke_static(helper_ref, vec![Reg(0)]);
    b.ret_void();
    add_static_method(&mut pb, app, "use", "(LE;)V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
#[should_panic(expected = "direct invocation on candidate enum")]
fn direct_invocation_on_a_candidate_is_an_invariant_violation() {
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let ctor = pb.method_ref("LE;", "<init>", "()V");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.invoke_direct(ctor, vec![Reg(0)]);
    b.ret_void();
    add_static_method(&mut pb, app, "bad", "(LE;)V", b.finish());
    let program = pb.finish();

    let _ = run_pass(&program, &[e]);
}
