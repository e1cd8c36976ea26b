//! Built-in function ABI table.
//!
//! Compiled images call built-ins by numeric id. The id, name and
//! signature of every built-in are fixed here; the behaviour is supplied
//! by the host at runtime. Ids are stable and dense: entry `n` of
//! [`LIBRARY`] has id `n`.

pub mod math;

use crate::type_tag::TypeTag;

/// Id, name and signature of one built-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinSignature {
    pub id: u16,
    pub name: &'static str,
    /// `TypeTag::Void` for built-ins that return nothing.
    pub ret: TypeTag,
    pub params: &'static [TypeTag],
}

impl BuiltinSignature {
    pub fn returns_value(&self) -> bool {
        self.ret != TypeTag::Void
    }
}

const fn sig(
    id: u16,
    name: &'static str,
    ret: TypeTag,
    params: &'static [TypeTag],
) -> BuiltinSignature {
    BuiltinSignature {
        id,
        name,
        ret,
        params,
    }
}

const VOID: TypeTag = TypeTag::Void;
const I: TypeTag = TypeTag::Integer;
const F: TypeTag = TypeTag::Float;
const S: TypeTag = TypeTag::String;
const K: TypeTag = TypeTag::Key;
const V: TypeTag = TypeTag::Vector;
const R: TypeTag = TypeTag::Rotation;
const L: TypeTag = TypeTag::List;

/// Number of built-ins in the table.
pub const LIBRARY_SIZE: usize = 328;

/// Every built-in, indexed by id.
pub static LIBRARY: [BuiltinSignature; LIBRARY_SIZE] = [
    sig(0, "llSin", F, &[F]),
    sig(1, "llCos", F, &[F]),
    sig(2, "llTan", F, &[F]),
    sig(3, "llAtan2", F, &[F, F]),
    sig(4, "llSqrt", F, &[F]),
    sig(5, "llPow", F, &[F, F]),
    sig(6, "llAbs", I, &[I]),
    sig(7, "llFabs", F, &[F]),
    sig(8, "llFrand", F, &[F]),
    sig(9, "llFloor", I, &[F]),
    sig(10, "llCeil", I, &[F]),
    sig(11, "llRound", I, &[F]),
    sig(12, "llVecMag", F, &[V]),
    sig(13, "llVecNorm", V, &[V]),
    sig(14, "llVecDist", F, &[V, V]),
    sig(15, "llRot2Euler", V, &[R]),
    sig(16, "llEuler2Rot", R, &[V]),
    sig(17, "llAxes2Rot", R, &[V, V, V]),
    sig(18, "llRot2Fwd", V, &[R]),
    sig(19, "llRot2Left", V, &[R]),
    sig(20, "llRot2Up", V, &[R]),
    sig(21, "llRotBetween", R, &[V, V]),
    sig(22, "llWhisper", VOID, &[I, S]),
    sig(23, "llSay", VOID, &[I, S]),
    sig(24, "llShout", VOID, &[I, S]),
    sig(25, "llListen", I, &[I, S, K, S]),
    sig(26, "llListenControl", VOID, &[I, I]),
    sig(27, "llListenRemove", VOID, &[I]),
    sig(28, "llSensor", VOID, &[S, K, I, F, F]),
    sig(29, "llSensorRepeat", VOID, &[S, K, I, F, F, F]),
    sig(30, "llSensorRemove", VOID, &[]),
    sig(31, "llDetectedName", S, &[I]),
    sig(32, "llDetectedKey", K, &[I]),
    sig(33, "llDetectedOwner", K, &[I]),
    sig(34, "llDetectedType", I, &[I]),
    sig(35, "llDetectedPos", V, &[I]),
    sig(36, "llDetectedVel", V, &[I]),
    sig(37, "llDetectedGrab", V, &[I]),
    sig(38, "llDetectedRot", R, &[I]),
    sig(39, "llDetectedGroup", I, &[I]),
    sig(40, "llDetectedLinkNumber", I, &[I]),
    sig(41, "llDie", VOID, &[]),
    sig(42, "llGround", F, &[V]),
    sig(43, "llCloud", F, &[V]),
    sig(44, "llWind", V, &[V]),
    sig(45, "llSetStatus", VOID, &[I, I]),
    sig(46, "llGetStatus", I, &[I]),
    sig(47, "llSetScale", VOID, &[V]),
    sig(48, "llGetScale", V, &[]),
    sig(49, "llSetColor", VOID, &[V, I]),
    sig(50, "llGetAlpha", F, &[I]),
    sig(51, "llSetAlpha", VOID, &[F, I]),
    sig(52, "llGetColor", V, &[I]),
    sig(53, "llSetTexture", VOID, &[S, I]),
    sig(54, "llScaleTexture", VOID, &[F, F, I]),
    sig(55, "llOffsetTexture", VOID, &[F, F, I]),
    sig(56, "llRotateTexture", VOID, &[F, I]),
    sig(57, "llGetTexture", S, &[I]),
    sig(58, "llSetPos", VOID, &[V]),
    sig(59, "llGetPos", V, &[]),
    sig(60, "llGetLocalPos", V, &[]),
    sig(61, "llSetRot", VOID, &[R]),
    sig(62, "llGetRot", R, &[]),
    sig(63, "llGetLocalRot", R, &[]),
    sig(64, "llSetForce", VOID, &[V, I]),
    sig(65, "llGetForce", V, &[]),
    sig(66, "llTarget", I, &[V, F]),
    sig(67, "llTargetRemove", VOID, &[I]),
    sig(68, "llRotTarget", I, &[R, F]),
    sig(69, "llRotTargetRemove", VOID, &[I]),
    sig(70, "llMoveToTarget", VOID, &[V, F]),
    sig(71, "llStopMoveToTarget", VOID, &[]),
    sig(72, "llApplyImpulse", VOID, &[V, I]),
    sig(73, "llApplyRotationalImpulse", VOID, &[V, I]),
    sig(74, "llSetTorque", VOID, &[V, I]),
    sig(75, "llGetTorque", V, &[]),
    sig(76, "llSetForceAndTorque", VOID, &[V, V, I]),
    sig(77, "llGetVel", V, &[]),
    sig(78, "llGetAccel", V, &[]),
    sig(79, "llGetOmega", V, &[]),
    sig(80, "llGetTimeOfDay", F, &[]),
    sig(81, "llGetWallclock", F, &[]),
    sig(82, "llGetTime", F, &[]),
    sig(83, "llResetTime", VOID, &[]),
    sig(84, "llGetAndResetTime", F, &[]),
    sig(85, "llSound", VOID, &[S, F, I, I]),
    sig(86, "llPlaySound", VOID, &[S, F]),
    sig(87, "llLoopSound", VOID, &[S, F]),
    sig(88, "llLoopSoundMaster", VOID, &[S, F]),
    sig(89, "llLoopSoundSlave", VOID, &[S, F]),
    sig(90, "llPlaySoundSlave", VOID, &[S, F]),
    sig(91, "llTriggerSound", VOID, &[S, F]),
    sig(92, "llStopSound", VOID, &[]),
    sig(93, "llPreloadSound", VOID, &[S]),
    sig(94, "llGetSubString", S, &[S, I, I]),
    sig(95, "llDeleteSubString", S, &[S, I, I]),
    sig(96, "llInsertString", S, &[S, I, S]),
    sig(97, "llToUpper", S, &[S]),
    sig(98, "llToLower", S, &[S]),
    sig(99, "llGiveMoney", I, &[K, I]),
    sig(100, "llMakeExplosion", VOID, &[I, F, F, F, F, S, V]),
    sig(101, "llMakeFountain", VOID, &[I, F, F, F, F, I, S, V, F]),
    sig(102, "llMakeSmoke", VOID, &[I, F, F, F, F, S, V]),
    sig(103, "llMakeFire", VOID, &[I, F, F, F, F, S, V]),
    sig(104, "llRezObject", VOID, &[S, V, V, R, I]),
    sig(105, "llLookAt", VOID, &[V, F, F]),
    sig(106, "llStopLookAt", VOID, &[]),
    sig(107, "llSetTimerEvent", VOID, &[F]),
    sig(108, "llSleep", VOID, &[F]),
    sig(109, "llGetMass", F, &[]),
    sig(110, "llCollisionFilter", VOID, &[S, K, I]),
    sig(111, "llTakeControls", VOID, &[I, I, I]),
    sig(112, "llReleaseControls", VOID, &[]),
    sig(113, "llAttachToAvatar", VOID, &[I]),
    sig(114, "llDetachFromAvatar", VOID, &[]),
    sig(115, "llTakeCamera", VOID, &[K]),
    sig(116, "llReleaseCamera", VOID, &[K]),
    sig(117, "llGetOwner", K, &[]),
    sig(118, "llInstantMessage", VOID, &[K, S]),
    sig(119, "llEmail", VOID, &[S, S, S]),
    sig(120, "llGetNextEmail", VOID, &[S, S]),
    sig(121, "llGetKey", K, &[]),
    sig(122, "llSetBuoyancy", VOID, &[F]),
    sig(123, "llSetHoverHeight", VOID, &[F, I, F]),
    sig(124, "llStopHover", VOID, &[]),
    sig(125, "llMinEventDelay", VOID, &[F]),
    sig(126, "llSoundPreload", VOID, &[S]),
    sig(127, "llRotLookAt", VOID, &[R, F, F]),
    sig(128, "llStringLength", I, &[S]),
    sig(129, "llStartAnimation", VOID, &[S]),
    sig(130, "llStopAnimation", VOID, &[S]),
    sig(131, "llPointAt", VOID, &[V]),
    sig(132, "llStopPointAt", VOID, &[]),
    sig(133, "llTargetOmega", VOID, &[V, F, F]),
    sig(134, "llGetStartParameter", I, &[]),
    sig(135, "llGodLikeRezObject", VOID, &[K, V]),
    sig(136, "llRequestPermissions", VOID, &[K, I]),
    sig(137, "llGetPermissionsKey", K, &[]),
    sig(138, "llGetPermissions", I, &[]),
    sig(139, "llGetLinkNumber", I, &[]),
    sig(140, "llSetLinkColor", VOID, &[I, V, I]),
    sig(141, "llCreateLink", VOID, &[K, I]),
    sig(142, "llBreakLink", VOID, &[I]),
    sig(143, "llBreakAllLinks", VOID, &[]),
    sig(144, "llGetLinkKey", K, &[I]),
    sig(145, "llGetLinkName", S, &[I]),
    sig(146, "llGetInventoryNumber", I, &[I]),
    sig(147, "llGetInventoryName", S, &[I, I]),
    sig(148, "llSetScriptState", VOID, &[S, I]),
    sig(149, "llGetEnergy", F, &[]),
    sig(150, "llGiveInventory", VOID, &[K, S]),
    sig(151, "llRemoveInventory", VOID, &[S]),
    sig(152, "llSetText", VOID, &[S, V, F]),
    sig(153, "llWater", F, &[V]),
    sig(154, "llPassTouches", VOID, &[I]),
    sig(155, "llRequestAgentData", K, &[K, I]),
    sig(156, "llRequestInventoryData", K, &[S]),
    sig(157, "llSetDamage", VOID, &[F]),
    sig(158, "llTeleportAgentHome", VOID, &[K]),
    sig(159, "llModifyLand", VOID, &[I, I]),
    sig(160, "llCollisionSound", VOID, &[S, F]),
    sig(161, "llCollisionSprite", VOID, &[S]),
    sig(162, "llGetAnimation", S, &[K]),
    sig(163, "llResetScript", VOID, &[]),
    sig(164, "llMessageLinked", VOID, &[I, I, S, K]),
    sig(165, "llPushObject", VOID, &[K, V, V, I]),
    sig(166, "llPassCollisions", VOID, &[I]),
    sig(167, "llGetScriptName", S, &[]),
    sig(168, "llGetNumberOfSides", I, &[]),
    sig(169, "llAxisAngle2Rot", R, &[V, F]),
    sig(170, "llRot2Axis", V, &[R]),
    sig(171, "llRot2Angle", F, &[R]),
    sig(172, "llAcos", F, &[F]),
    sig(173, "llAsin", F, &[F]),
    sig(174, "llAngleBetween", F, &[R, R]),
    sig(175, "llGetInventoryKey", K, &[S]),
    sig(176, "llAllowInventoryDrop", VOID, &[I]),
    sig(177, "llGetSunDirection", V, &[]),
    sig(178, "llGetTextureOffset", V, &[I]),
    sig(179, "llGetTextureScale", V, &[I]),
    sig(180, "llGetTextureRot", F, &[I]),
    sig(181, "llSubStringIndex", I, &[S, S]),
    sig(182, "llGetOwnerKey", K, &[K]),
    sig(183, "llGetCenterOfMass", V, &[]),
    sig(184, "llListSort", L, &[L, I, I]),
    sig(185, "llGetListLength", I, &[L]),
    sig(186, "llList2Integer", I, &[L, I]),
    sig(187, "llList2Float", F, &[L, I]),
    sig(188, "llList2String", S, &[L, I]),
    sig(189, "llList2Key", K, &[L, I]),
    sig(190, "llList2Vector", V, &[L, I]),
    sig(191, "llList2Rot", R, &[L, I]),
    sig(192, "llList2List", L, &[L, I, I]),
    sig(193, "llDeleteSubList", L, &[L, I, I]),
    sig(194, "llGetListEntryType", I, &[L, I]),
    sig(195, "llList2CSV", S, &[L]),
    sig(196, "llCSV2List", L, &[S]),
    sig(197, "llListRandomize", L, &[L, I]),
    sig(198, "llList2ListStrided", L, &[L, I, I, I]),
    sig(199, "llGetRegionCorner", V, &[]),
    sig(200, "llListInsertList", L, &[L, L, I]),
    sig(201, "llListFindList", I, &[L, L]),
    sig(202, "llGetObjectName", S, &[]),
    sig(203, "llSetObjectName", VOID, &[S]),
    sig(204, "llGetDate", S, &[]),
    sig(205, "llEdgeOfWorld", I, &[V, V]),
    sig(206, "llGetAgentInfo", I, &[K]),
    sig(207, "llAdjustSoundVolume", VOID, &[F]),
    sig(208, "llSetSoundQueueing", VOID, &[I]),
    sig(209, "llSetSoundRadius", VOID, &[F]),
    sig(210, "llKey2Name", S, &[K]),
    sig(211, "llSetTextureAnim", VOID, &[I, I, I, I, F, F, F]),
    sig(212, "llTriggerSoundLimited", VOID, &[S, F, V, V]),
    sig(213, "llEjectFromLand", VOID, &[K]),
    sig(214, "llParseString2List", L, &[S, L, L]),
    sig(215, "llOverMyLand", I, &[K]),
    sig(216, "llGetLandOwnerAt", K, &[V]),
    sig(217, "llGetNotecardLine", K, &[S, I]),
    sig(218, "llGetAgentSize", V, &[K]),
    sig(219, "llSameGroup", I, &[K]),
    sig(220, "llUnSit", VOID, &[K]),
    sig(221, "llGroundSlope", V, &[V]),
    sig(222, "llGroundNormal", V, &[V]),
    sig(223, "llGroundContour", V, &[V]),
    sig(224, "llGetAttached", I, &[]),
    sig(225, "llGetFreeMemory", I, &[]),
    sig(226, "llGetRegionName", S, &[]),
    sig(227, "llGetRegionTimeDilation", F, &[]),
    sig(228, "llGetRegionFPS", F, &[]),
    sig(229, "llParticleSystem", VOID, &[L]),
    sig(230, "llGroundRepel", VOID, &[F, I, F]),
    sig(231, "llGiveInventoryList", VOID, &[K, S, L]),
    sig(232, "llSetVehicleType", VOID, &[I]),
    sig(233, "llSetVehicleFloatParam", VOID, &[I, F]),
    sig(234, "llSetVehicleVectorParam", VOID, &[I, V]),
    sig(235, "llSetVehicleRotationParam", VOID, &[I, R]),
    sig(236, "llSetVehicleFlags", VOID, &[I]),
    sig(237, "llRemoveVehicleFlags", VOID, &[I]),
    sig(238, "llSitTarget", VOID, &[V, R]),
    sig(239, "llAvatarOnSitTarget", K, &[]),
    sig(240, "llAddToLandPassList", VOID, &[K, F]),
    sig(241, "llSetTouchText", VOID, &[S]),
    sig(242, "llSetSitText", VOID, &[S]),
    sig(243, "llSetCameraEyeOffset", VOID, &[V]),
    sig(244, "llSetCameraAtOffset", VOID, &[V]),
    sig(245, "llDumpList2String", S, &[L, S]),
    sig(246, "llScriptDanger", I, &[V]),
    sig(247, "llDialog", VOID, &[K, S, L, I]),
    sig(248, "llVolumeDetect", VOID, &[I]),
    sig(249, "llResetOtherScript", VOID, &[S]),
    sig(250, "llGetScriptState", I, &[S]),
    sig(251, "llRemoteLoadScript", VOID, &[K, S, I, I]),
    sig(252, "llSetRemoteScriptAccessPin", VOID, &[I]),
    sig(253, "llRemoteLoadScriptPin", VOID, &[K, S, I, I, I]),
    sig(254, "llOpenRemoteDataChannel", VOID, &[]),
    sig(255, "llSendRemoteData", K, &[K, S, I, S]),
    sig(256, "llRemoteDataReply", VOID, &[K, K, S, I]),
    sig(257, "llCloseRemoteDataChannel", VOID, &[K]),
    sig(258, "llMD5String", S, &[S, I]),
    sig(259, "llSetPrimitiveParams", VOID, &[L]),
    sig(260, "llStringToBase64", S, &[S]),
    sig(261, "llBase64ToString", S, &[S]),
    sig(262, "llXorBase64Strings", S, &[S, S]),
    sig(263, "llRemoteDataSetRegion", VOID, &[]),
    sig(264, "llLog10", F, &[F]),
    sig(265, "llLog", F, &[F]),
    sig(266, "llGetAnimationList", L, &[K]),
    sig(267, "llSetParcelMusicURL", VOID, &[S]),
    sig(268, "llGetRootPosition", V, &[]),
    sig(269, "llGetRootRotation", R, &[]),
    sig(270, "llGetObjectDesc", S, &[]),
    sig(271, "llSetObjectDesc", VOID, &[S]),
    sig(272, "llGetCreator", K, &[]),
    sig(273, "llGetTimestamp", S, &[]),
    sig(274, "llSetLinkAlpha", VOID, &[I, F, I]),
    sig(275, "llGetNumberOfPrims", I, &[]),
    sig(276, "llGetNumberOfNotecardLines", K, &[S]),
    sig(277, "llGetBoundingBox", L, &[K]),
    sig(278, "llGetGeometricCenter", V, &[]),
    sig(279, "llGetPrimitiveParams", L, &[L]),
    sig(280, "llIntegerToBase64", S, &[I]),
    sig(281, "llBase64ToInteger", I, &[S]),
    sig(282, "llGetGMTclock", F, &[]),
    sig(283, "llGetSimulatorHostname", S, &[]),
    sig(284, "llSetLocalRot", VOID, &[R]),
    sig(285, "llParseStringKeepNulls", L, &[S, L, L]),
    sig(286, "llRezAtRoot", VOID, &[S, V, V, R, I]),
    sig(287, "llGetObjectPermMask", I, &[I]),
    sig(288, "llSetObjectPermMask", VOID, &[I, I]),
    sig(289, "llGetInventoryPermMask", I, &[S, I]),
    sig(290, "llSetInventoryPermMask", VOID, &[S, I, I]),
    sig(291, "llGetInventoryCreator", K, &[S]),
    sig(292, "llOwnerSay", VOID, &[S]),
    sig(293, "llRequestSimulatorData", K, &[S, I]),
    sig(294, "llForceMouselook", VOID, &[I]),
    sig(295, "llGetObjectMass", F, &[K]),
    sig(296, "llListReplaceList", L, &[L, L, I, I]),
    sig(297, "llLoadURL", VOID, &[K, S, S]),
    sig(298, "llParcelMediaCommandList", VOID, &[L]),
    sig(299, "llParcelMediaQuery", L, &[L]),
    sig(300, "llModPow", I, &[I, I, I]),
    sig(301, "llGetInventoryType", I, &[S]),
    sig(302, "llSetPayPrice", VOID, &[I, L]),
    sig(303, "llGetCameraPos", V, &[]),
    sig(304, "llGetCameraRot", R, &[]),
    sig(305, "llSetPrimURL", VOID, &[S]),
    sig(306, "llRefreshPrimURL", VOID, &[]),
    sig(307, "llEscapeURL", S, &[S]),
    sig(308, "llUnescapeURL", S, &[S]),
    sig(309, "llMapDestination", VOID, &[S, V, V]),
    sig(310, "llAddToLandBanList", VOID, &[K, F]),
    sig(311, "llRemoveFromLandPassList", VOID, &[K]),
    sig(312, "llRemoveFromLandBanList", VOID, &[K]),
    sig(313, "llSetCameraParams", VOID, &[L]),
    sig(314, "llClearCameraParams", VOID, &[]),
    sig(315, "llListStatistics", F, &[I, L]),
    sig(316, "llGetUnixTime", I, &[]),
    sig(317, "llGetParcelFlags", I, &[V]),
    sig(318, "llGetRegionFlags", I, &[]),
    sig(319, "llXorBase64StringsCorrect", S, &[S, S]),
    sig(320, "llHTTPRequest", K, &[S, L, S]),
    sig(321, "llResetLandBanList", VOID, &[]),
    sig(322, "llResetLandPassList", VOID, &[]),
    sig(323, "llGetParcelPrimCount", I, &[V, I, I]),
    sig(324, "llGetParcelPrimOwners", L, &[V]),
    sig(325, "llGetObjectPrimCount", I, &[K]),
    sig(326, "llGetParcelMaxPrims", I, &[V, I]),
    sig(327, "llGetParcelDetails", L, &[V, L]),
];

/// Signature for `id`, if the id is assigned.
pub fn lookup(id: u16) -> Option<&'static BuiltinSignature> {
    LIBRARY.get(id as usize)
}

/// Signature for a built-in by name.
pub fn by_name(name: &str) -> Option<&'static BuiltinSignature> {
    LIBRARY.iter().find(|s| s.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense() {
        for (i, entry) in LIBRARY.iter().enumerate() {
            assert_eq!(entry.id as usize, i, "{} is out of place", entry.name);
        }
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = LIBRARY.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), LIBRARY_SIZE);
    }

    #[test]
    fn well_known_ids() {
        assert_eq!(lookup(0).map(|s| s.name), Some("llSin"));
        assert_eq!(lookup(23).map(|s| s.name), Some("llSay"));
        assert_eq!(lookup(292).map(|s| s.name), Some("llOwnerSay"));
        assert_eq!(lookup(327).map(|s| s.name), Some("llGetParcelDetails"));
        assert!(lookup(328).is_none());
        assert!(lookup(400).is_none());
    }

    #[test]
    fn signatures() {
        let say = by_name("llSay").unwrap();
        assert_eq!(say.params, &[TypeTag::Integer, TypeTag::String]);
        assert!(!say.returns_value());

        let norm = by_name("llVecNorm").unwrap();
        assert_eq!(norm.ret, TypeTag::Vector);

        let http = by_name("llHTTPRequest").unwrap();
        assert_eq!(http.ret, TypeTag::Key);
        assert_eq!(http.params, &[TypeTag::String, TypeTag::List, TypeTag::String]);
    }

    #[test]
    fn no_void_parameters() {
        for entry in LIBRARY.iter() {
            assert!(
                !entry.params.contains(&TypeTag::Void),
                "{} has a void parameter",
                entry.name
            );
        }
    }
}
