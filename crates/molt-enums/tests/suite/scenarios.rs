//! End-to-end pass behavior on small assembled programs.

use molt_ir::{CodeBuilder, ProgramBuilder, Reg};
use pretty_assertions::assert_eq;

use crate::suite::fixtures::{add_class, add_enum, add_static_method, run_pass};

#[test]
fn value_used_only_as_itself_is_accepted() {
    // static E pick() { E x = E.A; return x; }
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let field_a = pb.field_ref("LE;", "A", "LE;");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.sget_object(field_a);
    b.move_result_pseudo_object(Reg(0));
    b.move_object(Reg(1), Reg(0));
    b.ret_object(Reg(1));
    add_static_method(&mut pb, app, "pick", "()LE;", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn store_into_object_field_rejects() {
    // void keep(App this, E e) { this.slot = e; } where slot: Object
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let app_ty = pb.type_id("LApp;");
    let app = pb.add_class(app_ty, false);
    let slot_ty = pb.well_known().object;
    pb.add_field(app, "slot", slot_ty, true);
    let slot = pb.field_ref("LApp;", "slot", "Ljava/lang/Object;");
    let keep_proto = pb.proto("(LE;)V");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.load_param_object(Reg(1));
    b.iput_object(Reg(1), Reg(0), slot);
    b.ret_void();
    pb.add_method(app, "keep", keep_proto, false, true, Some(b.finish()));
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.is_empty());
}

#[test]
fn class_literal_rejects() {
    // static void probe() { Class c = E.class; }
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.const_class(e);
    b.move_result_pseudo_object(Reg(0));
    b.ret_void();
    add_static_method(&mut pb, app, "probe", "()V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.is_empty());
}

#[test]
fn check_cast_to_supertype_rejects() {
    // static void widen(E e) { Object o = (Object) e; }
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let object = pb.well_known().object;
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.check_cast(Reg(0), object);
    b.move_result_pseudo_object(Reg(0));
    b.ret_void();
    add_static_method(&mut pb, app, "widen", "(LE;)V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.is_empty());
}

#[test]
fn return_as_supertype_rejects() {
    // static Object leak() { return E.A; }
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let field_a = pb.field_ref("LE;", "A", "LE;");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.sget_object(field_a);
    b.move_result_pseudo_object(Reg(0));
    b.ret_object(Reg(0));
    add_static_method(&mut pb, app, "leak", "()Ljava/lang/Object;", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.is_empty());
}

#[test]
fn interface_invocation_on_enum_rejects() {
    // static int cmp(E e, Object o) { return ((Comparable) e).compareTo(o); }
    // modeled as invoke-interface Comparable.compareTo on a receiver of type E
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let comparable = pb.type_id("Ljava/lang/Comparable;");
    pb.add_class(comparable, false);
    let compare = pb.method_ref(
        "Ljava/lang/Comparable;",
        "compareTo",
        "(Ljava/lang/Object;)I",
    );
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.load_param_object(Reg(1));
    b.invoke_interface(compare, vec![Reg(0), Reg(1)]);
    b.move_result(Reg(2));
    b.ret(Reg(2));
    add_static_method(&mut pb, app, "cmp", "(LE;Ljava/lang/Object;)I", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.is_empty());
}

#[test]
fn heterogeneous_array_store_rejects_both() {
    // The array register may be [LE; or [LOther;: storing through it cannot
    // be tracked, so both element types are rejected.
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let other = add_enum(&mut pb, "LOther;", &["X"]);
    let array_e = pb.type_id("[LE;");
    let array_other = pb.type_id("[LOther;");
    let app = add_class(&mut pb, "LApp;");

    let mut b = CodeBuilder::new();
    let else_l = b.new_label();
    let join_l = b.new_label();
    b.load_param(Reg(0));
    b.load_param_object(Reg(1));
    b.const_(Reg(2), 1);
    b.if_eqz(Reg(0), else_l);
    b.new_array(Reg(2), array_e);
    b.move_result_pseudo_object(Reg(3));
    b.goto(join_l);
    b.bind(else_l);
    b.new_array(Reg(2), array_other);
    b.move_result_pseudo_object(Reg(3));
    b.bind(join_l);
    b.const_(Reg(4), 0);
    b.aput_object(Reg(1), Reg(3), Reg(4));
    b.ret_void();
    add_static_method(&mut pb, app, "stash", "(ZLE;)V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e, other]);
    assert!(result.is_empty());
}

#[test]
fn homogeneous_array_store_is_accepted() {
    // static void stash(E e) { E[] a = new E[1]; a[0] = e; }
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let array_e = pb.type_id("[LE;");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.const_(Reg(1), 1);
    b.new_array(Reg(1), array_e);
    b.move_result_pseudo_object(Reg(2));
    b.const_(Reg(3), 0);
    b.aput_object(Reg(0), Reg(2), Reg(3));
    b.ret_void();
    add_static_method(&mut pb, app, "stash", "(LE;)V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn aput_through_a_non_array_register_is_ignored() {
    // No array type ever reaches the register, so the store constrains
    // nothing.
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.const_(Reg(1), 0);
    b.aput_object(Reg(0), Reg(0), Reg(1));
    b.ret_void();
    add_static_method(&mut pb, app, "odd", "(LE;)V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn unreachable_upcasts_do_not_reject() {
    // Dead code past the return still names E, so the method is analyzed,
    // but bottom-entry blocks are skipped by the detector.
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.ret_void();
    b.const_class(e);
    b.move_result_pseudo_object(Reg(0));
    b.ret_void();
    add_static_method(&mut pb, app, "dead", "()V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn consistent_store_into_typed_field_is_accepted() {
    // static void keep(E e) { Holder.slot = e; } where slot: E
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let holder_ty = pb.type_id("LHolder;");
    let holder = pb.add_class(holder_ty, false);
    pb.add_field(holder, "slot", e, true);
    let slot = pb.field_ref("LHolder;", "slot", "LE;");
    let app = add_class(&mut pb, "LApp;");
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.sput_object(Reg(0), slot);
    b.ret_void();
    add_static_method(&mut pb, app, "keep", "(LE;)V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e]);
    assert!(result.contains(e));
}

#[test]
fn untouched_candidates_survive_everything() {
    let mut pb = ProgramBuilder::new();
    let e = add_enum(&mut pb, "LE;", &["A"]);
    let other = add_enum(&mut pb, "LOther;", &["X"]);
    let app = add_class(&mut pb, "LApp;");
    // Only E is ever observed as Object; Other is untouched.
    let mut b = CodeBuilder::new();
    b.load_param_object(Reg(0));
    b.check_cast(Reg(0), pb.well_known().object);
    b.move_result_pseudo_object(Reg(0));
    b.ret_void();
    add_static_method(&mut pb, app, "widen", "(LE;)V", b.finish());
    let program = pb.finish();

    let result = run_pass(&program, &[e, other]);
    assert!(!result.contains(e));
    assert!(result.contains(other));
    assert_eq!(result.len(), 1);
}
